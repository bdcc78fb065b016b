//! DICOM dictionary tag identity.
//!
//! A [`DictionaryTag`] names one attribute of the metadata store: the numeric
//! `(gggg,eeee)` tag, its value representation, its multiplicity, and, for
//! vendor attributes, the private implementer that owns it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::CoreError;

/// DICOM value representation (the scalar type of an attribute).
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueRepresentation {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FD,
    FL,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OL,
    OV,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    SV,
    TM,
    UC,
    UI,
    UL,
    UN,
    UR,
    US,
    UT,
    UV,
}

impl ValueRepresentation {
    pub const ALL: [ValueRepresentation; 34] = [
        Self::AE,
        Self::AS,
        Self::AT,
        Self::CS,
        Self::DA,
        Self::DS,
        Self::DT,
        Self::FD,
        Self::FL,
        Self::IS,
        Self::LO,
        Self::LT,
        Self::OB,
        Self::OD,
        Self::OF,
        Self::OL,
        Self::OV,
        Self::OW,
        Self::PN,
        Self::SH,
        Self::SL,
        Self::SQ,
        Self::SS,
        Self::ST,
        Self::SV,
        Self::TM,
        Self::UC,
        Self::UI,
        Self::UL,
        Self::UN,
        Self::UR,
        Self::US,
        Self::UT,
        Self::UV,
    ];

    /// The two-letter VR code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AE => "AE",
            Self::AS => "AS",
            Self::AT => "AT",
            Self::CS => "CS",
            Self::DA => "DA",
            Self::DS => "DS",
            Self::DT => "DT",
            Self::FD => "FD",
            Self::FL => "FL",
            Self::IS => "IS",
            Self::LO => "LO",
            Self::LT => "LT",
            Self::OB => "OB",
            Self::OD => "OD",
            Self::OF => "OF",
            Self::OL => "OL",
            Self::OV => "OV",
            Self::OW => "OW",
            Self::PN => "PN",
            Self::SH => "SH",
            Self::SL => "SL",
            Self::SQ => "SQ",
            Self::SS => "SS",
            Self::ST => "ST",
            Self::SV => "SV",
            Self::TM => "TM",
            Self::UC => "UC",
            Self::UI => "UI",
            Self::UL => "UL",
            Self::UN => "UN",
            Self::UR => "UR",
            Self::US => "US",
            Self::UT => "UT",
            Self::UV => "UV",
        }
    }

    /// Date, date-time and time representations.
    pub fn is_date_time(self) -> bool {
        matches!(self, Self::DA | Self::DT | Self::TM)
    }

    /// Integer representations that fit a 32-bit column cast.
    pub fn is_integer(self) -> bool {
        matches!(self, Self::IS | Self::SS | Self::US)
    }

    /// Integer representations that need a 64-bit column cast.
    pub fn is_wide_integer(self) -> bool {
        matches!(self, Self::SL | Self::UL)
    }
}

impl fmt::Display for ValueRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueRepresentation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|vr| vr.as_str() == upper)
            .ok_or_else(|| CoreError::invalid_vr(s))
    }
}

/// Whether an attribute holds a single value or a delimited list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ValueMultiplicity {
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "n", alias = "1-n", alias = "N")]
    Many,
}

impl fmt::Display for ValueMultiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "1"),
            Self::Many => write!(f, "n"),
        }
    }
}

impl FromStr for ValueMultiplicity {
    type Err = CoreError;

    /// Accepts DICOM VM notation: `1` is single-valued, anything else
    /// (`n`, `1-n`, `2`, `2-2n`, ...) is multi-valued.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "1" {
            return Ok(Self::One);
        }
        let valid = !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_digit() || c == '-' || c == 'n' || c == 'N');
        if valid {
            Ok(Self::Many)
        } else {
            Err(CoreError::invalid_vm(s))
        }
    }
}

/// Identity of one DICOM attribute.
///
/// Equality and hashing consider only the numeric tag and the implementer,
/// so two dictionary lookups of the same attribute compare equal even if
/// their display names differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryTag {
    pub tag: u32,
    pub vr: ValueRepresentation,
    pub vm: ValueMultiplicity,
    pub name: String,
    /// Private creator; empty for standard attributes.
    #[serde(default)]
    pub implementer_id: String,
}

impl DictionaryTag {
    pub fn new(
        tag: u32,
        vr: ValueRepresentation,
        vm: ValueMultiplicity,
        name: impl Into<String>,
    ) -> Self {
        Self {
            tag,
            vr,
            vm,
            name: name.into(),
            implementer_id: String::new(),
        }
    }

    pub fn private(
        tag: u32,
        vr: ValueRepresentation,
        vm: ValueMultiplicity,
        name: impl Into<String>,
        implementer_id: impl Into<String>,
    ) -> Self {
        Self {
            tag,
            vr,
            vm,
            name: name.into(),
            implementer_id: implementer_id.into(),
        }
    }

    pub fn is_private(&self) -> bool {
        !self.implementer_id.is_empty()
    }

    pub fn group(&self) -> u16 {
        (self.tag >> 16) as u16
    }

    pub fn element(&self) -> u16 {
        (self.tag & 0xFFFF) as u16
    }
}

impl PartialEq for DictionaryTag {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.implementer_id == other.implementer_id
    }
}

impl Eq for DictionaryTag {}

impl Hash for DictionaryTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag.hash(state);
        self.implementer_id.hash(state);
    }
}

impl fmt::Display for DictionaryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.group(), self.element())?;
        if self.is_private() {
            write!(f, "[{}]", self.implementer_id)?;
        }
        if !self.name.is_empty() {
            write!(f, " {}", self.name)?;
        }
        Ok(())
    }
}

/// Parse a tag number written as 8 hex digits, optionally as `(gggg,eeee)`
/// or `gggg,eeee`.
pub fn parse_tag_number(s: &str) -> Result<u32, CoreError> {
    let trimmed = s
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .replace(',', "");
    if trimmed.len() != 8 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::invalid_tag(s));
    }
    u32::from_str_radix(&trimmed, 16).map_err(|_| CoreError::invalid_tag(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_vr_round_trip_all_codes() {
        for vr in ValueRepresentation::ALL {
            assert_eq!(vr.as_str().parse::<ValueRepresentation>().unwrap(), vr);
        }
        assert_eq!("pn".parse::<ValueRepresentation>().unwrap(), ValueRepresentation::PN);
        assert!("XX".parse::<ValueRepresentation>().is_err());
    }

    #[test]
    fn test_vr_classification() {
        assert!(ValueRepresentation::DA.is_date_time());
        assert!(ValueRepresentation::TM.is_date_time());
        assert!(!ValueRepresentation::PN.is_date_time());
        assert!(ValueRepresentation::US.is_integer());
        assert!(ValueRepresentation::UL.is_wide_integer());
        assert!(!ValueRepresentation::UL.is_integer());
    }

    #[test]
    fn test_vm_parse() {
        assert_eq!("1".parse::<ValueMultiplicity>().unwrap(), ValueMultiplicity::One);
        assert_eq!("1-n".parse::<ValueMultiplicity>().unwrap(), ValueMultiplicity::Many);
        assert_eq!("2".parse::<ValueMultiplicity>().unwrap(), ValueMultiplicity::Many);
        assert!("one".parse::<ValueMultiplicity>().is_err());
        assert!("".parse::<ValueMultiplicity>().is_err());
    }

    #[test]
    fn test_equality_ignores_name_and_vr() {
        let a = DictionaryTag::new(
            0x0010_0010,
            ValueRepresentation::PN,
            ValueMultiplicity::One,
            "PatientName",
        );
        let b = DictionaryTag::new(0x0010_0010, ValueRepresentation::LO, ValueMultiplicity::Many, "");
        assert_eq!(a, b);

        let set: HashSet<_> = [a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 1);

        let private = DictionaryTag::private(
            0x0010_0010,
            ValueRepresentation::PN,
            ValueMultiplicity::One,
            "PatientName",
            "ACME",
        );
        assert_ne!(a, private);
    }

    #[test]
    fn test_display() {
        let tag = DictionaryTag::new(
            0x0008_0020,
            ValueRepresentation::DA,
            ValueMultiplicity::One,
            "StudyDate",
        );
        assert_eq!(tag.to_string(), "(0008,0020) StudyDate");
        assert_eq!(tag.group(), 0x0008);
        assert_eq!(tag.element(), 0x0020);
    }

    #[test]
    fn test_parse_tag_number() {
        assert_eq!(parse_tag_number("00100010").unwrap(), 0x0010_0010);
        assert_eq!(parse_tag_number("(0008,103E)").unwrap(), 0x0008_103E);
        assert_eq!(parse_tag_number("0008,103e").unwrap(), 0x0008_103E);
        assert!(parse_tag_number("0010001").is_err());
        assert!(parse_tag_number("0010001G").is_err());
    }
}
