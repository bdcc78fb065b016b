//! Mapping between dictionary tags and physical SQL columns.
//!
//! ## Column names
//!
//! - Legacy (the format already on disk): `tag_<hex8>` for standard tags and
//!   `tag_<implementer>_<hex8>` for private ones.
//! - Explicit: `tag2_<hex8>_<implementer>`, the implementer token is always
//!   present and may be empty, so parsing never depends on the name length.
//!
//! The implementer is sanitized by replacing every character that is not an
//! ASCII letter or digit with `_`.
//!
//! ## Column types
//!
//! Multi-valued tags and private tags are stored as wide strings. Single
//! valued standard tags get a width from a fixed per-VR table tuned to the
//! worst-case DICOM field lengths.

use std::sync::LazyLock;

use dicomstore_core::{DictionaryTag, ValueMultiplicity, ValueRepresentation};
use regex::Regex;
use serde::{Deserialize, Serialize};

const LEGACY_PREFIX: &str = "tag_";
const EXPLICIT_PREFIX: &str = "tag2_";

/// Length of a legacy name without an implementer segment (`tag_` + 8 hex).
const LEGACY_PLAIN_LEN: usize = 12;

pub const WIDE_STRING_TYPE: &str = "nvarchar(512)";
pub const DATE_TIME_TYPE: &str = "datetime2";

/// Private "store date-time" attribute recorded on ingest.
pub const STORE_DATE_TIME_TAG: u32 = 0x0011_1010;
pub const STORE_DATE_TIME_IMPLEMENTER: &str = "DICOMSTORE";

static LEGACY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^tag_(?:([A-Za-z0-9_]+)_)?([0-9A-Fa-f]{8})$").expect("valid legacy column regex")
});

static EXPLICIT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^tag2_([0-9A-Fa-f]{8})_([A-Za-z0-9_]*)$").expect("valid explicit column regex")
});

/// Column naming scheme used when emitting new column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnNaming {
    #[default]
    Legacy,
    Explicit,
}

/// Bidirectional tag ↔ column codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagCodec {
    naming: ColumnNaming,
}

impl TagCodec {
    pub fn new(naming: ColumnNaming) -> Self {
        Self { naming }
    }

    pub fn naming(&self) -> ColumnNaming {
        self.naming
    }

    /// Physical column name of a tag.
    pub fn column_name(&self, tag: &DictionaryTag) -> String {
        match self.naming {
            ColumnNaming::Legacy => legacy_column_name(tag),
            ColumnNaming::Explicit => format!(
                "{EXPLICIT_PREFIX}{:08X}_{}",
                tag.tag,
                sanitize(&tag.implementer_id)
            ),
        }
    }

    /// Recover `(tag id, sanitized implementer)` from a column name in
    /// either naming scheme.
    ///
    /// Legacy names are matched structurally: the trailing 8 hex digits are
    /// the tag and anything between `tag_` and the final `_` is the
    /// implementer. Names that fit neither scheme yield `None`.
    pub fn parse_column_name(name: &str) -> Option<(u32, String)> {
        if let Some(caps) = EXPLICIT_NAME.captures(name) {
            let tag = u32::from_str_radix(&caps[1], 16).ok()?;
            return Some((tag, caps[2].to_string()));
        }

        let caps = LEGACY_NAME.captures(name)?;
        let tag = u32::from_str_radix(&caps[2], 16).ok()?;
        let implementer = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        Some((tag, implementer))
    }

    /// Length-based parse kept for compatibility with existing schema readers:
    /// a name longer than 12 characters is assumed to carry an implementer.
    pub fn parse_legacy_column_name(name: &str) -> Option<(u32, String)> {
        if !name.is_ascii() || !name.starts_with(LEGACY_PREFIX) {
            return None;
        }

        if name.len() > LEGACY_PLAIN_LEN {
            let hex = &name[name.len() - 8..];
            let implementer = &name[LEGACY_PREFIX.len()..name.len() - 9];
            let tag = u32::from_str_radix(hex, 16).ok()?;
            Some((tag, implementer.to_string()))
        } else {
            let tag = u32::from_str_radix(&name[LEGACY_PREFIX.len()..], 16).ok()?;
            Some((tag, String::new()))
        }
    }

    /// SQL column type of a tag.
    pub fn column_type(tag: &DictionaryTag) -> String {
        if tag.vm != ValueMultiplicity::One {
            return WIDE_STRING_TYPE.to_string();
        }

        if tag.is_private() {
            if tag.tag == STORE_DATE_TIME_TAG && tag.implementer_id == STORE_DATE_TIME_IMPLEMENTER {
                return DATE_TIME_TYPE.to_string();
            }
            return WIDE_STRING_TYPE.to_string();
        }

        format!("nvarchar({})", vr_width(tag.vr))
    }
}

fn legacy_column_name(tag: &DictionaryTag) -> String {
    if tag.implementer_id.is_empty() {
        format!("{LEGACY_PREFIX}{:08X}", tag.tag)
    } else {
        format!(
            "{LEGACY_PREFIX}{}_{:08X}",
            sanitize(&tag.implementer_id),
            tag.tag
        )
    }
}

/// Replace every character that is not an ASCII letter or digit with `_`.
pub fn sanitize(implementer: &str) -> String {
    implementer
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Column width per VR for single-valued standard tags.
pub fn vr_width(vr: ValueRepresentation) -> u32 {
    use ValueRepresentation::*;
    match vr {
        AE => 16,
        AS => 20,
        CS => 16,
        DA => 32,
        DS => 100,
        FL => 100,
        IS => 20,
        LO => 64,
        LT => 1024,
        PN => 974,
        SH => 16,
        SL => 20,
        SS => 20,
        ST => 16,
        TM => 32,
        UI => 128,
        US => 16,
        _ => 1024,
    }
}
