//! Document information dictionary and summaries

use super::Document;
use crate::encryption::SecurityInfo;
use crate::parser::PdfVersion;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

/// Overview of a document, as printed by `vellum info`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DocumentSummary {
    #[cfg_attr(feature = "serde", serde(serialize_with = "serialize_version"))]
    pub version: PdfVersion,
    /// `None` when the page tree cannot be read, e.g. while locked
    pub page_count: Option<usize>,
    pub object_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<FixedOffset>>,
    pub modification_date: Option<DateTime<FixedOffset>>,
    pub security: Option<SecurityInfo>,
}

#[cfg(feature = "serde")]
fn serialize_version<S: serde::Serializer>(version: &PdfVersion, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(version)
}

impl DocumentSummary {
    pub(crate) fn of(doc: &Document) -> Self {
        let text = |key: &str| -> Option<String> {
            doc.info()?
                .get(key)
                .and_then(|value| doc.resolve(value).as_string())
                .map(|s| s.to_text())
        };
        let date = |key: &str| text(key).as_deref().and_then(parse_pdf_date);

        Self {
            version: doc.version(),
            page_count: doc.page_count().ok(),
            object_count: doc.objects().len(),
            title: text("Title"),
            author: text("Author"),
            producer: text("Producer"),
            creation_date: date("CreationDate"),
            modification_date: date("ModDate"),
            security: doc.security_info(),
        }
    }
}

/// Parses a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`). Every field after the
/// year is optional; a missing offset means UTC.
pub fn parse_pdf_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    let text = text.strip_prefix("D:").unwrap_or(text);
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(s) => s.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits[..4].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 2, 1)?, field(6, 2, 1)?)?;
    let naive = date.and_hms_opt(field(8, 2, 0)?, field(10, 2, 0)?, field(12, 2, 0)?)?;

    let rest = &text[digits.len()..];
    let offset = match rest.chars().next() {
        Some(sign @ ('+' | '-')) => {
            let numbers: Vec<i32> = rest[1..]
                .split(|c: char| !c.is_ascii_digit())
                .filter(|part| !part.is_empty())
                .filter_map(|part| part.parse().ok())
                .collect();
            let hours = numbers.first().copied().unwrap_or(0);
            let minutes = numbers.get(1).copied().unwrap_or(0);
            let seconds = hours * 3600 + minutes * 60;
            if sign == '-' {
                FixedOffset::west_opt(seconds)?
            } else {
                FixedOffset::east_opt(seconds)?
            }
        }
        _ => FixedOffset::east_opt(0)?,
    };
    offset.from_local_datetime(&naive).single()
}

/// Formats a date the way PDF `Info` entries expect, in UTC.
pub fn format_pdf_date(date: DateTime<Utc>) -> String {
    date.format("D:%Y%m%d%H%M%SZ00'00'").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::PdfString;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_full_date_with_offset() {
        let date = parse_pdf_date("D:20230415103000+02'00'").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2023, 4, 15));
        assert_eq!(date.hour(), 10);
        assert_eq!(date.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_parse_partial_dates() {
        let date = parse_pdf_date("D:1999").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (1999, 1, 1));
        assert!(parse_pdf_date("D:20231345").is_none());
        assert!(parse_pdf_date("garbage").is_none());
        let western = parse_pdf_date("D:20200101120000-05'30").unwrap();
        assert_eq!(western.offset().local_minus_utc(), -(5 * 3600 + 30 * 60));
    }

    #[test]
    fn test_format_round_trips() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 1).unwrap();
        let text = format_pdf_date(now);
        assert_eq!(text, "D:20240229235901Z00'00'");
        assert_eq!(parse_pdf_date(&text).unwrap(), now);
    }

    #[test]
    fn test_summary_reads_info() {
        let mut doc = Document::new();
        doc.set_info_entry("Title", PdfString::from_text("Annual report"));
        doc.set_info_entry("CreationDate", PdfString::from_text("D:20210102"));
        let summary = doc.summary();
        assert_eq!(summary.title.as_deref(), Some("Annual report"));
        assert_eq!(summary.page_count, Some(0));
        assert_eq!(summary.creation_date.unwrap().year(), 2021);
        assert!(summary.security.is_none());
    }
}
