//! Parser for the e-reader "My Clippings.txt" export
//!
//! The export is a flat file of entries separated by a line of ten `=`
//! characters. Each entry looks like:
//!
//! ```text
//! The Pragmatic Programmer (Andrew Hunt)
//! - Your Highlight on page 12 | Location 170-172 | Added on Sunday, March 7, 2021 10:21:24 PM
//!
//! Care about your craft.
//! ==========
//! ```
//!
//! Bookmarks are dropped; highlights and notes become [`Clipping`]s.

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{ClippingError, Result};

/// Line separating two entries in the export
pub const SEPARATOR: &str = "==========";

/// Prefix the user puts in front of a quote to have it skipped
pub const SKIP_MARKER: &str = ">> ";

const DATE_FORMAT: &str = "%B %d, %Y %I:%M:%S %p";
const ID_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Typographic characters rewritten to ASCII before filtering
const REPLACEMENTS: &[(&str, &str)] = &[
    // UTF-8 em dash decoded as Windows-1252
    ("â€”", "-"),
    ("\u{2014}", "-"),
    ("\u{2013}", "-"),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("\u{201C}", "\""),
    ("\u{201D}", "\""),
    ("\u{2026}", "..."),
];

/// A single highlight taken from the export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clipping {
    pub book_title: String,
    pub author: String,
    pub location: String,
    pub highlighted_at: NaiveDateTime,
    pub body: String,
    /// The user prefixed the quote with [`SKIP_MARKER`]
    pub marked_for_skip: bool,
}

impl Clipping {
    /// Stable identity used by the processed ledger
    pub fn id(&self) -> String {
        let body: String = self.body.chars().filter(|c| *c != '\n').collect();
        format!(
            "{} - {} - {} - {} - {}",
            self.book_title,
            self.author,
            self.location,
            self.highlighted_at.format(ID_DATE_FORMAT),
            body
        )
    }
}

impl fmt::Display for Clipping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.book_title, self.author)?;
        writeln!(
            f,
            "Location {} | {}",
            self.location,
            self.highlighted_at.format(DATE_FORMAT)
        )?;
        write!(f, "{}", self.body)
    }
}

fn is_printable(c: char) -> bool {
    c.is_ascii_graphic() || matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Normalise line endings, map typographic characters to ASCII and drop
/// everything that is not printable ASCII
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.replace("\r\n", "\n");
    for (from, to) in REPLACEMENTS {
        text = text.replace(from, to);
    }
    text.chars().filter(|c| is_printable(*c)).collect()
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*) \((.*)\)$").expect("valid title regex"))
}

fn metadata_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^.* Location (.*) \| Added on \w+, (.*)$").expect("valid metadata regex")
    })
}

/// Parse one entry (the text between two separators)
pub fn parse_clipping(raw: &str) -> Result<Clipping> {
    let sanitized = sanitize(raw);
    let sanitized = sanitized.trim();

    let (header, body) = sanitized
        .split_once("\n\n")
        .ok_or_else(|| ClippingError::MissingBody(sanitized.to_string()))?;

    let mut lines = header.lines().map(str::trim);
    let (title_line, metadata_line) = match (lines.next(), lines.next(), lines.next()) {
        (Some(title), Some(metadata), None) => (title, metadata),
        _ => return Err(ClippingError::MalformedHeader(header.to_string()).into()),
    };

    let title_caps = title_regex()
        .captures(title_line)
        .ok_or_else(|| ClippingError::TitleLine(title_line.to_string()))?;
    let metadata_caps = metadata_regex()
        .captures(metadata_line)
        .ok_or_else(|| ClippingError::MetadataLine(metadata_line.to_string()))?;

    let date = &metadata_caps[2];
    let highlighted_at = NaiveDateTime::parse_from_str(date.trim(), DATE_FORMAT)
        .map_err(|_| ClippingError::Date(date.to_string()))?;

    let body = body.trim();
    let (body, marked_for_skip) = match body.strip_prefix(SKIP_MARKER) {
        Some(rest) => (rest.trim_start(), true),
        None => (body, false),
    };

    Ok(Clipping {
        book_title: title_caps[1].to_string(),
        author: title_caps[2].to_string(),
        location: metadata_caps[1].to_string(),
        highlighted_at,
        body: body.to_string(),
        marked_for_skip,
    })
}

fn is_bookmark(raw: &str) -> bool {
    raw.to_lowercase().contains("your bookmark on")
}

/// Parse a whole export, oldest highlight first
pub fn parse_clippings(contents: &str) -> Result<Vec<Clipping>> {
    let mut clippings = Vec::new();

    for raw in contents.split(SEPARATOR).map(str::trim) {
        if raw.is_empty() || is_bookmark(raw) {
            continue;
        }
        clippings.push(parse_clipping(raw)?);
    }

    clippings.sort_by_key(|c| c.highlighted_at);
    tracing::debug!("Parsed {} clippings", clippings.len());

    Ok(clippings)
}

/// Read and parse the export at `path`
pub fn read_clippings_file(path: &Path) -> Result<Vec<Clipping>> {
    let contents = std::fs::read_to_string(path).map_err(|source| ClippingError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_clippings(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClipcastError;
    use chrono::NaiveDate;

    const HIGHLIGHT: &str = "The Pragmatic Programmer (Andrew Hunt)\n\
- Your Highlight on page 12 | Location 170-172 | Added on Sunday, March 7, 2021 10:21:24 PM\n\
\n\
Care about your craft.";

    fn clipping_error(result: Result<Clipping>) -> ClippingError {
        match result {
            Err(ClipcastError::Clippings(e)) => e,
            other => panic!("Expected clipping error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_highlight() {
        let clipping = parse_clipping(HIGHLIGHT).unwrap();

        assert_eq!(clipping.book_title, "The Pragmatic Programmer");
        assert_eq!(clipping.author, "Andrew Hunt");
        assert_eq!(clipping.location, "170-172");
        assert_eq!(
            clipping.highlighted_at,
            NaiveDate::from_ymd_opt(2021, 3, 7)
                .unwrap()
                .and_hms_opt(22, 21, 24)
                .unwrap()
        );
        assert_eq!(clipping.body, "Care about your craft.");
        assert!(!clipping.marked_for_skip);
    }

    #[test]
    fn test_author_is_last_parenthesised_group() {
        let raw = "Dune (Dune Chronicles, Book 1) (Frank Herbert)\n\
- Your Highlight at Location 100-101 | Added on Monday, January 4, 2021 8:05:00 AM\n\
\n\
Fear is the mind-killer.";
        let clipping = parse_clipping(raw).unwrap();

        assert_eq!(clipping.book_title, "Dune (Dune Chronicles, Book 1)");
        assert_eq!(clipping.author, "Frank Herbert");
        assert_eq!(clipping.location, "100-101");
    }

    #[test]
    fn test_id_format() {
        let raw = format!("{}\nSecond line.", HIGHLIGHT);
        let clipping = parse_clipping(&raw).unwrap();

        assert_eq!(
            clipping.id(),
            "The Pragmatic Programmer - Andrew Hunt - 170-172 - 2021-03-07T22:21:24 - \
Care about your craft.Second line."
        );
    }

    #[test]
    fn test_sanitize_maps_and_filters() {
        assert_eq!(sanitize("a\u{2014}b"), "a-b");
        assert_eq!(sanitize("aâ€”b"), "a-b");
        assert_eq!(sanitize("\u{201C}Hi\u{201D} it\u{2019}s"), "\"Hi\" it's");
        assert_eq!(sanitize("wait\u{2026}"), "wait...");
        assert_eq!(sanitize("\u{feff}caf\u{e9}"), "caf");
        assert_eq!(sanitize("line\r\nnext"), "line\nnext");
    }

    #[test]
    fn test_parse_with_bom_and_crlf() {
        let raw = format!("\u{feff}{}", HIGHLIGHT.replace('\n', "\r\n"));
        let clipping = parse_clipping(&raw).unwrap();
        assert_eq!(clipping.book_title, "The Pragmatic Programmer");
        assert_eq!(clipping.body, "Care about your craft.");
    }

    #[test]
    fn test_skip_marker() {
        let raw = HIGHLIGHT.replace("Care about", ">> Care about");
        let marked = parse_clipping(&raw).unwrap();
        let plain = parse_clipping(HIGHLIGHT).unwrap();

        assert!(marked.marked_for_skip);
        assert_eq!(marked.body, "Care about your craft.");
        // Marking must not change the identity of the clipping
        assert_eq!(marked.id(), plain.id());
    }

    #[test]
    fn test_multi_paragraph_body() {
        let raw = format!("{}\n\nAnd then some.", HIGHLIGHT);
        let clipping = parse_clipping(&raw).unwrap();
        assert_eq!(clipping.body, "Care about your craft.\n\nAnd then some.");
    }

    #[test]
    fn test_missing_body() {
        let raw = "Title (Author)\n- Your Highlight at Location 1 | Added on Monday, January 4, 2021 8:05:00 AM";
        assert!(matches!(
            clipping_error(parse_clipping(raw)),
            ClippingError::MissingBody(_)
        ));
    }

    #[test]
    fn test_malformed_header() {
        let raw = "Title (Author)\n\nBody";
        assert!(matches!(
            clipping_error(parse_clipping(raw)),
            ClippingError::MalformedHeader(_)
        ));
    }

    #[test]
    fn test_title_without_author() {
        let raw = "Untitled\n- Your Highlight at Location 1 | Added on Monday, January 4, 2021 8:05:00 AM\n\nBody";
        assert!(matches!(
            clipping_error(parse_clipping(raw)),
            ClippingError::TitleLine(_)
        ));
    }

    #[test]
    fn test_bad_metadata_line() {
        let raw = "Title (Author)\n- Your Highlight somewhere\n\nBody";
        assert!(matches!(
            clipping_error(parse_clipping(raw)),
            ClippingError::MetadataLine(_)
        ));
    }

    #[test]
    fn test_bad_date() {
        let raw = "Title (Author)\n- Your Highlight at Location 1 | Added on Monday, Smarch 4, 2021 8:05:00 AM\n\nBody";
        assert!(matches!(
            clipping_error(parse_clipping(raw)),
            ClippingError::Date(_)
        ));
    }

    #[test]
    fn test_parse_clippings_sorts_and_drops_bookmarks() {
        let contents = "\u{feff}Newer Book (Someone)\n\
- Your Highlight at Location 5-6 | Added on Friday, May 7, 2021 9:00:00 AM\n\
\n\
Newer quote.\n\
==========\n\
Some Book (Someone)\n\
- Your Bookmark on Location 12 | Added on Friday, May 7, 2021 9:30:00 AM\n\
\n\
\n\
==========\n\
Older Book (Someone Else)\n\
- Your Highlight at Location 1-2 | Added on Tuesday, February 2, 2021 7:15:00 PM\n\
\n\
Older quote.\n\
==========\n";

        let clippings = parse_clippings(contents).unwrap();
        assert_eq!(clippings.len(), 2);
        assert_eq!(clippings[0].body, "Older quote.");
        assert_eq!(clippings[1].body, "Newer quote.");
    }

    #[test]
    fn test_parse_clippings_empty() {
        assert!(parse_clippings("").unwrap().is_empty());
        assert!(parse_clippings("==========\n==========\n").unwrap().is_empty());
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_clippings_file(Path::new("/nonexistent/My Clippings.txt")).unwrap_err();
        assert!(err.to_string().contains("Failed to read clippings file"));
    }

    #[test]
    fn test_display() {
        let clipping = parse_clipping(HIGHLIGHT).unwrap();
        let shown = clipping.to_string();
        assert!(shown.starts_with("The Pragmatic Programmer (Andrew Hunt)\n"));
        assert!(shown.contains("Location 170-172 | March 07, 2021 10:21:24 PM"));
        assert!(shown.ends_with("Care about your craft."));
    }
}
