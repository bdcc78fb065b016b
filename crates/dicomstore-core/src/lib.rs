pub mod error;
pub mod level;
pub mod name;
pub mod tag;
pub mod datetime;

pub use error::{CoreError, ErrorCategory, Result};
pub use level::{Identifier, Level, UID_DELIMITER};
pub use name::clean_person_name;
pub use tag::{DictionaryTag, ValueMultiplicity, ValueRepresentation, parse_tag_number};
pub use datetime::{DateFormatter, DicomDateFormatter};
