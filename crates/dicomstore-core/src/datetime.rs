use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::tag::{DictionaryTag, ValueRepresentation};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day]");
const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const DATE_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day] [hour]:[minute]:[second]");

/// Renders a date/time bound as the string bound into a query parameter.
///
/// The canonical string depends on the attribute's VR.
pub trait DateFormatter: Send + Sync {
    fn format(&self, value: Option<&PrimitiveDateTime>, tag: &DictionaryTag) -> String;
}

/// Default formatter: `DA` → `yyyyMMdd`, `TM` → `HH:mm:ss`,
/// `DT` and everything else → `yyyyMMdd HH:mm:ss`. A missing value formats
/// as the empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomDateFormatter;

impl DateFormatter for DicomDateFormatter {
    fn format(&self, value: Option<&PrimitiveDateTime>, tag: &DictionaryTag) -> String {
        let Some(value) = value else {
            return String::new();
        };
        let format = match tag.vr {
            ValueRepresentation::DA => DATE_FORMAT,
            ValueRepresentation::TM => TIME_FORMAT,
            _ => DATE_TIME_FORMAT,
        };
        match value.format(format) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "failed to format date bound");
                String::new()
            }
        }
    }
}
