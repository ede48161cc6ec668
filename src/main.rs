use clap::{Parser, Subcommand};
use mets_factory::{assemble, config, document, ordering, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Arguments for assembling one intellectual entity.
#[derive(clap::Args)]
struct BuildArgs {
    /// Intellectual entity id; names the root structMap division
    #[arg(long)]
    ie_id: String,

    /// Batch directory; file locations are written relative to it
    #[arg(long)]
    input_dir: PathBuf,

    /// Preservation master directory [default: <input-dir>/pm if present]
    #[arg(long)]
    pm: Option<PathBuf>,

    /// Modified master directory [default: <input-dir>/mm if present]
    #[arg(long)]
    mm: Option<PathBuf>,

    /// Access derivative directory [default: <input-dir>/ad if present]
    #[arg(long)]
    ad: Option<PathBuf>,

    /// Files are born-digital originals, not scans
    #[arg(long)]
    digital_original: bool,

    /// Write the document here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "mets-factory")]
#[command(about = "Assemble METS documents for archival ingest")]
#[command(long_about = "\
Assemble METS documents for archival ingest

Each processing tier of an intellectual entity is a directory of files:

  batch/
  ├── mets.toml          # Optional config (see 'mets-factory gen-config')
  ├── pm/                # Preservation masters  → rep1
  │   ├── 1.tif
  │   ├── 2.tif
  │   └── 10.tif
  ├── mm/                # Modified masters      → rep2
  └── ad/                # Access derivatives    → rep3 (optional)

File order: names whose stem is only digits sort by value after all other
names, which sort as plain strings. 'mets-factory order DIR' shows the result.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a METS document for one intellectual entity
    Build(BuildArgs),
    /// Print the reading order of the files in a directory
    Order {
        /// Directory to list
        dir: PathBuf,
    },
    /// Print a stock mets.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => build(&args)?,
        Command::Order { dir } => {
            let files = ordering::ordered_file_list(&dir)?;
            output::print_ordered_list(&dir, &files);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn build(args: &BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let site_config = config::load_config(&args.input_dir)?;
    init_thread_pool(&site_config.processing);

    let pm = resolve_tier(&args.input_dir, args.pm.as_deref(), "pm");
    let mm = resolve_tier(&args.input_dir, args.mm.as_deref(), "mm");
    let ad = resolve_tier(&args.input_dir, args.ad.as_deref(), "ad");

    let entity = assemble::EntityInput {
        ie_id: &args.ie_id,
        pres_master_dir: pm.as_deref(),
        modified_master_dir: mm.as_deref(),
        access_derivative_dir: ad.as_deref(),
        digital_original: args.digital_original,
        input_dir: &args.input_dir,
    };

    let indent = site_config.output.indent;
    let mut doc = document::build_mets();
    assemble::Assembler::new(site_config).assemble(&mut doc, &entity)?;
    let xml = doc.to_xml(indent)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, xml)?;
            output::print_document_summary(&doc);
            println!("==> Wrote {}", path.display());
        }
        None => print!("{}", xml),
    }
    Ok(())
}

/// Explicit directory if given, else `<input_dir>/<default_name>` when it exists.
fn resolve_tier(input_dir: &Path, explicit: Option<&Path>, default_name: &str) -> Option<PathBuf> {
    match explicit {
        Some(dir) => Some(dir.to_path_buf()),
        None => {
            let candidate = input_dir.join(default_name);
            candidate.is_dir().then_some(candidate)
        }
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: config can lower the count, not raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
