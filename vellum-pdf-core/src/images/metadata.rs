//! Lossless removal of data that does not affect rendering

use crate::document::Document;
use crate::error::Result;
use crate::objects::Object;

/// Standard 14 fonts; viewers always have these, so embedded programs are redundant.
const STANDARD_FONTS: [&str; 14] = [
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Symbol",
    "ZapfDingbats",
];

const PAGE_EXTRAS: [&str; 3] = ["Metadata", "PieceInfo", "Thumb"];
const FONT_FILES: [&str; 3] = ["FontFile", "FontFile2", "FontFile3"];

/// What [`strip_metadata`] removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StripReport {
    pub info_removed: bool,
    pub entries_removed: usize,
    pub font_programs_removed: usize,
    pub objects_removed: usize,
}

impl StripReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `ABCDEF+Helvetica` -> `Helvetica`
fn base_font_name(name: &str) -> &str {
    match name.split_once('+') {
        Some((prefix, rest)) if prefix.len() == 6 && prefix.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// Removes the `Info` dictionary, catalog and page `Metadata`, page `PieceInfo`
/// and `Thumb`, embedded programs of standard 14 fonts, and finally every object
/// no longer reachable from the trailer. Running it twice changes nothing more.
pub fn strip_metadata(doc: &mut Document) -> Result<StripReport> {
    doc.ensure_unlocked()?;
    let mut report = StripReport {
        info_removed: doc.trailer_mut().remove("Info").is_some(),
        ..StripReport::default()
    };

    for object in doc.objects.values_mut() {
        let dict = match object {
            Object::Dictionary(dict) => dict,
            _ => continue,
        };
        if dict.has_type("Catalog") {
            report.entries_removed += usize::from(dict.remove("Metadata").is_some());
        } else if dict.has_type("Page") {
            for key in PAGE_EXTRAS {
                report.entries_removed += usize::from(dict.remove(key).is_some());
            }
        } else if dict.has_type("FontDescriptor") {
            let standard = dict
                .get_name("FontName")
                .map(base_font_name)
                .is_some_and(|name| STANDARD_FONTS.contains(&name));
            if standard {
                for key in FONT_FILES {
                    report.font_programs_removed += usize::from(dict.remove(key).is_some());
                }
            }
        }
    }

    report.objects_removed = doc.remove_unreachable();
    tracing::debug!(?report, "stripped metadata");
    Ok(report)
}
