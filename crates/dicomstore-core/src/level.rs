use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Position in the Patient → Study → Series hierarchy.
///
/// Each level is backed by its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[serde(alias = "Patient")]
    Patient,
    #[serde(alias = "Study")]
    Study,
    #[serde(alias = "Series")]
    Series,
    #[serde(alias = "Image")]
    Image,
}

impl Level {
    pub const ALL: [Level; 4] = [Self::Patient, Self::Study, Self::Series, Self::Image];

    /// Name of the table that stores rows of this level.
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Patient => "Patient",
            Self::Study => "Study",
            Self::Series => "Series",
            Self::Image => "Image",
        }
    }

    /// The level directly above this one, if any.
    pub fn parent(self) -> Option<Level> {
        match self {
            Self::Patient => None,
            Self::Study => Some(Self::Patient),
            Self::Series => Some(Self::Study),
            Self::Image => Some(Self::Series),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for Level {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Self::Patient),
            "study" => Ok(Self::Study),
            "series" => Ok(Self::Series),
            "image" | "instance" => Ok(Self::Image),
            _ => Err(CoreError::invalid_level(s)),
        }
    }
}

/// Multi-valued UID fields are delimited by a backslash.
pub const UID_DELIMITER: char = '\\';

/// Hierarchical key that scopes a query to the children of one parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(default)]
    pub patient_key: String,
    /// One or more study UIDs, backslash-delimited.
    #[serde(default)]
    pub study_uid: String,
    #[serde(default)]
    pub series_uid: String,
}

impl Identifier {
    pub fn new(
        patient_key: impl Into<String>,
        study_uid: impl Into<String>,
        series_uid: impl Into<String>,
    ) -> Self {
        Self {
            patient_key: patient_key.into(),
            study_uid: study_uid.into(),
            series_uid: series_uid.into(),
        }
    }

    /// Identifier that does not restrict anything.
    pub fn dummy() -> Self {
        Self::default()
    }

    pub fn for_patient(patient_key: impl Into<String>) -> Self {
        Self::new(patient_key, "", "")
    }

    pub fn for_study(patient_key: impl Into<String>, study_uid: impl Into<String>) -> Self {
        Self::new(patient_key, study_uid, "")
    }

    /// True when no key of the identifier is set.
    pub fn is_dummy(&self) -> bool {
        self.patient_key.trim().is_empty()
            && self.study_uid.trim().is_empty()
            && self.series_uid.trim().is_empty()
    }

    /// Non-empty study UIDs carried in the study-UID field, in order.
    pub fn study_uids(&self) -> impl Iterator<Item = &str> {
        self.study_uid
            .split(UID_DELIMITER)
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
    }
}
