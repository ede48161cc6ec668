//! Metadata wrappers (`mets:mdWrap`).
//!
//! Every metadata section in a METS document (`techMD`, `rightsMD`,
//! `sourceMD`, `digiprovMD`) holds one `mdWrap`: a declared metadata type and
//! exactly one payload, either embedded XML (`xmlData`) or base64-encoded
//! bytes (`binData`).
//!
//! Requests are validated when the wrapper is built, not when it is
//! serialized:
//!
//! - `MDTYPE="OTHER"` must carry a non-empty `OTHERMDTYPE`, and `OTHERMDTYPE`
//!   is rejected for any other type.
//! - Exactly one of the binary and XML payload lists may be non-empty.

use crate::xml::Element;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum WrapError {
    #[error("Invalid metadata type: {0}")]
    InvalidMetadataType(String),
    #[error("Both binary and XML payloads supplied; exactly one is allowed")]
    AmbiguousPayload,
    #[error("No payload supplied; one of binary or XML data is required")]
    EmptyPayload,
}

/// Metadata types recognized by the METS `MDTYPE` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdType {
    Marc,
    Mods,
    Ead,
    Dc,
    NisoImg,
    LcAv,
    Vra,
    TeiHdr,
    Ddi,
    Fgdc,
    Lom,
    Premis,
    PremisObject,
    PremisAgent,
    PremisRights,
    PremisEvent,
    TextMd,
    MetsRights,
    Iso19115,
    EacCpf,
    Lido,
    Other,
}

const MDTYPE_NAMES: &[(MdType, &str)] = &[
    (MdType::Marc, "MARC"),
    (MdType::Mods, "MODS"),
    (MdType::Ead, "EAD"),
    (MdType::Dc, "DC"),
    (MdType::NisoImg, "NISOIMG"),
    (MdType::LcAv, "LC-AV"),
    (MdType::Vra, "VRA"),
    (MdType::TeiHdr, "TEIHDR"),
    (MdType::Ddi, "DDI"),
    (MdType::Fgdc, "FGDC"),
    (MdType::Lom, "LOM"),
    (MdType::Premis, "PREMIS"),
    (MdType::PremisObject, "PREMIS:OBJECT"),
    (MdType::PremisAgent, "PREMIS:AGENT"),
    (MdType::PremisRights, "PREMIS:RIGHTS"),
    (MdType::PremisEvent, "PREMIS:EVENT"),
    (MdType::TextMd, "TEXTMD"),
    (MdType::MetsRights, "METSRIGHTS"),
    (MdType::Iso19115, "ISO 19115:2003 NAP"),
    (MdType::EacCpf, "EAC-CPF"),
    (MdType::Lido, "LIDO"),
    (MdType::Other, "OTHER"),
];

impl MdType {
    /// Attribute value as written to `MDTYPE`.
    pub fn as_str(self) -> &'static str {
        MDTYPE_NAMES
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, name)| *name)
            .unwrap_or("OTHER")
    }
}

impl fmt::Display for MdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MdType {
    type Err = WrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MDTYPE_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(t, _)| *t)
            .ok_or_else(|| WrapError::InvalidMetadataType(s.to_string()))
    }
}

/// Attributes of an `mdWrap` element.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapAttributes {
    pub mdtype: MdType,
    /// Free-text sub-type; required when `mdtype` is [`MdType::Other`].
    pub other_mdtype: Option<String>,
    pub label: Option<String>,
    pub mimetype: Option<String>,
}

impl WrapAttributes {
    pub fn new(mdtype: MdType) -> Self {
        Self {
            mdtype,
            other_mdtype: None,
            label: None,
            mimetype: None,
        }
    }

    /// `MDTYPE="OTHER"` with the given `OTHERMDTYPE`.
    pub fn other(other_mdtype: &str) -> Self {
        Self {
            other_mdtype: Some(other_mdtype.to_string()),
            ..Self::new(MdType::Other)
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Build from attribute name/value pairs (`MDTYPE`, `OTHERMDTYPE`,
    /// `LABEL`, `MIMETYPE`).
    ///
    /// A missing `MDTYPE`, an unknown type value, or an unrecognized key is
    /// an [`WrapError::InvalidMetadataType`].
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self, WrapError> {
        let mut mdtype = None;
        let mut attrs = Self::new(MdType::Other);
        for (key, value) in pairs {
            match *key {
                "MDTYPE" => mdtype = Some(value.parse::<MdType>()?),
                "OTHERMDTYPE" => attrs.other_mdtype = Some(value.to_string()),
                "LABEL" => attrs.label = Some(value.to_string()),
                "MIMETYPE" => attrs.mimetype = Some(value.to_string()),
                other => {
                    return Err(WrapError::InvalidMetadataType(format!(
                        "unexpected attribute {other}"
                    )));
                }
            }
        }
        attrs.mdtype =
            mdtype.ok_or_else(|| WrapError::InvalidMetadataType("MDTYPE is required".into()))?;
        Ok(attrs)
    }

    fn validate(&self) -> Result<(), WrapError> {
        let other = self.other_mdtype.as_deref().map(str::trim);
        match (self.mdtype, other) {
            (MdType::Other, Some(o)) if !o.is_empty() => Ok(()),
            (MdType::Other, _) => Err(WrapError::InvalidMetadataType(
                "MDTYPE OTHER requires OTHERMDTYPE".into(),
            )),
            (_, Some(_)) => Err(WrapError::InvalidMetadataType(format!(
                "OTHERMDTYPE is only valid with MDTYPE OTHER, got {}",
                self.mdtype
            ))),
            (_, None) => Ok(()),
        }
    }
}

/// Wrapped metadata content. Exactly one variant per wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Elements placed, in order, under one `xmlData`.
    Xml(Vec<Element>),
    /// Byte chunks concatenated and base64-encoded into one `binData`.
    /// Chunk boundaries are not kept: decoding yields a single byte string.
    Binary(Vec<Vec<u8>>),
}

/// A validated `mdWrap`.
#[derive(Debug, Clone, PartialEq)]
pub struct MdWrap {
    attrs: WrapAttributes,
    payload: Payload,
}

impl MdWrap {
    pub fn attributes(&self) -> &WrapAttributes {
        &self.attrs
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn to_element(&self) -> Element {
        let mut wrap = Element::mets("mdWrap").with_attr("MDTYPE", self.attrs.mdtype.as_str());
        if let Some(other) = &self.attrs.other_mdtype {
            wrap = wrap.with_attr("OTHERMDTYPE", other.as_str());
        }
        if let Some(label) = &self.attrs.label {
            wrap = wrap.with_attr("LABEL", label.as_str());
        }
        if let Some(mimetype) = &self.attrs.mimetype {
            wrap = wrap.with_attr("MIMETYPE", mimetype.as_str());
        }

        let body = match &self.payload {
            Payload::Xml(elements) => elements
                .iter()
                .cloned()
                .fold(Element::mets("xmlData"), Element::with_child),
            Payload::Binary(chunks) => {
                Element::mets("binData").with_text(STANDARD.encode(chunks.concat()))
            }
        };
        wrap.with_child(body)
    }
}

/// Build an `mdWrap` from its attributes and exactly one non-empty payload.
pub fn build_mdwrap(
    attrs: WrapAttributes,
    bin_data: Option<Vec<Vec<u8>>>,
    xml_data: Option<Vec<Element>>,
) -> Result<MdWrap, WrapError> {
    attrs.validate()?;

    let bin_data = bin_data.filter(|b| !b.is_empty());
    let xml_data = xml_data.filter(|x| !x.is_empty());

    let payload = match (bin_data, xml_data) {
        (Some(_), Some(_)) => return Err(WrapError::AmbiguousPayload),
        (None, None) => return Err(WrapError::EmptyPayload),
        (Some(bin), None) => Payload::Binary(bin),
        (None, Some(xml)) => Payload::Xml(xml),
    };

    Ok(MdWrap { attrs, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::QName;

    fn sample_xml() -> Element {
        Element::parse("<node><key1>value1</key1><key2>value2</key2></node>").unwrap()
    }

    #[test]
    fn other_type_with_xml_payload() {
        let attrs = WrapAttributes::from_pairs(&[("MDTYPE", "OTHER"), ("OTHERMDTYPE", "TEST")])
            .unwrap();
        let wrap = build_mdwrap(attrs, None, Some(vec![sample_xml()])).unwrap();
        let el = wrap.to_element();

        assert_eq!(el.tag(), "{http://www.loc.gov/METS/}mdWrap");
        assert_eq!(el.attr("MDTYPE"), Some("OTHER"));
        assert_eq!(el.attr("OTHERMDTYPE"), Some("TEST"));
    }

    #[test]
    fn xml_payload_survives_round_trip() {
        let wrap = build_mdwrap(WrapAttributes::other("TEST"), None, Some(vec![sample_xml()]))
            .unwrap();
        let el = wrap.to_element();

        let reparsed = Element::parse(&el.to_pretty_string(2).unwrap()).unwrap();

        assert_eq!(reparsed, el);
        let node = reparsed
            .find("{http://www.loc.gov/METS/}xmlData/node")
            .unwrap();
        assert_eq!(node.find("key2").unwrap().text(), Some("value2"));
    }

    #[test]
    fn xml_payload_keeps_padded_and_mixed_text() {
        let padded = Element::parse("<note><v>  padded value  </v></note>").unwrap();
        let mixed = Element::parse("<p>Hello <b>world</b> again</p>").unwrap();
        let wrap = build_mdwrap(
            WrapAttributes::other("TEST"),
            None,
            Some(vec![padded, mixed]),
        )
        .unwrap();
        let el = wrap.to_element();

        let reparsed = Element::parse(&el.to_pretty_string(2).unwrap()).unwrap();

        assert_eq!(reparsed, el);
        let data = reparsed.find("{http://www.loc.gov/METS/}xmlData").unwrap();
        assert_eq!(
            data.find("note/v").unwrap().text(),
            Some("  padded value  ")
        );
        let p = data.find("p").unwrap();
        assert_eq!(p.text(), Some("Hello "));
        assert_eq!(p.children()[0].text(), Some("world"));
        assert_eq!(p.children()[0].tail(), Some(" again"));
    }

    #[test]
    fn xml_payload_keeps_input_order() {
        let items = vec![
            Element::new(QName::local("first")),
            Element::new(QName::local("second")),
            Element::new(QName::local("third")),
        ];
        let wrap = build_mdwrap(WrapAttributes::new(MdType::Premis), None, Some(items)).unwrap();
        let el = wrap.to_element();

        let xml_data = el.find("{http://www.loc.gov/METS/}xmlData").unwrap();
        let names: Vec<_> = xml_data
            .children()
            .iter()
            .map(|c| c.name.local.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert!(el.find("{http://www.loc.gov/METS/}binData").is_none());
    }

    #[test]
    fn binary_payload_is_base64() {
        let wrap = build_mdwrap(
            WrapAttributes::new(MdType::TextMd),
            Some(vec![b"hello ".to_vec(), b"world".to_vec()]),
            None,
        )
        .unwrap();
        let el = wrap.to_element();

        let bin = el.find("{http://www.loc.gov/METS/}binData").unwrap();
        assert_eq!(bin.text(), Some("aGVsbG8gd29ybGQ="));
        assert_eq!(el.children().len(), 1);
        assert!(el.attr("OTHERMDTYPE").is_none());
    }

    #[test]
    fn other_without_subtype_rejected() {
        let err = build_mdwrap(
            WrapAttributes::new(MdType::Other),
            None,
            Some(vec![sample_xml()]),
        )
        .unwrap_err();
        assert!(matches!(err, WrapError::InvalidMetadataType(_)));
    }

    #[test]
    fn blank_subtype_rejected() {
        let err = build_mdwrap(WrapAttributes::other("  "), None, Some(vec![sample_xml()]))
            .unwrap_err();
        assert!(matches!(err, WrapError::InvalidMetadataType(_)));
    }

    #[test]
    fn subtype_on_standard_type_rejected() {
        let mut attrs = WrapAttributes::new(MdType::Mods);
        attrs.other_mdtype = Some("TEST".into());
        let err = build_mdwrap(attrs, None, Some(vec![sample_xml()])).unwrap_err();
        assert!(matches!(err, WrapError::InvalidMetadataType(_)));
    }

    #[test]
    fn missing_mdtype_key_rejected() {
        let err = WrapAttributes::from_pairs(&[("OTHERMDTYPE", "TEST")]).unwrap_err();
        assert!(matches!(err, WrapError::InvalidMetadataType(_)));
    }

    #[test]
    fn unknown_mdtype_rejected() {
        let err = WrapAttributes::from_pairs(&[("MDTYPE", "JPEG")]).unwrap_err();
        assert_eq!(err, WrapError::InvalidMetadataType("JPEG".into()));
    }

    #[test]
    fn both_payloads_rejected() {
        let err = build_mdwrap(
            WrapAttributes::other("TEST"),
            Some(vec![vec![1, 2, 3]]),
            Some(vec![sample_xml()]),
        )
        .unwrap_err();
        assert_eq!(err, WrapError::AmbiguousPayload);
    }

    #[test]
    fn no_payload_rejected() {
        assert_eq!(
            build_mdwrap(WrapAttributes::other("TEST"), None, None).unwrap_err(),
            WrapError::EmptyPayload
        );
        assert_eq!(
            build_mdwrap(WrapAttributes::other("TEST"), Some(vec![]), Some(vec![])).unwrap_err(),
            WrapError::EmptyPayload
        );
    }

    #[test]
    fn mdtype_names_parse_back() {
        for (t, name) in MDTYPE_NAMES {
            assert_eq!(name.parse::<MdType>().unwrap(), *t);
            assert_eq!(t.as_str(), *name);
        }
    }
}
