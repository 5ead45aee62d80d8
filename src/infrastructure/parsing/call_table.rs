//! Call table parser for the dashboard's live-calls view
//!
//! Extracts [`CallRecord`]s from the two row sections the dashboard renders
//! (the live-calls table and the last-activity table body), in document
//! order. Row anomalies are logged and skip that row only.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::error::{ParsingError, ParsingResult};
use crate::domain::call::{AudioRef, CallRecord, CallStatus};

/// Minimum number of columns a row must have to be considered a call row.
const MIN_COLUMNS: usize = 3;

/// Matches a play-handler invocation and captures its two arguments:
/// device identifier and call UUID, e.g. `playSound('dev-7','ab-12')`.
static PLAY_HANDLER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)play\w*\s*\(\s*['"]([\w.-]+)['"]\s*,\s*['"]([\w.-]+)['"]"#)
        .expect("play handler pattern is valid")
});

/// CSS selectors for the row sections of the live-calls view.
#[derive(Debug, Clone)]
pub struct CallTableSelectors {
    /// Comma-joined row selector covering both table sections, so one
    /// traversal yields rows in document order.
    pub rows: String,
    /// Cell selector within a row.
    pub cells: String,
    /// Elements that may carry a play handler.
    pub clickable: String,
}

impl Default for CallTableSelectors {
    fn default() -> Self {
        Self {
            rows: "table#livecalls tbody tr, tbody#lastactivity tr".to_string(),
            cells: "td".to_string(),
            clickable: "[onclick]".to_string(),
        }
    }
}

/// Parser for the live-calls table markup.
pub struct CallTableParser {
    row_selector: Selector,
    cell_selector: Selector,
    clickable_selector: Selector,
}

impl CallTableParser {
    /// Create a parser with the default selectors.
    pub fn new() -> ParsingResult<Self> {
        Self::with_selectors(&CallTableSelectors::default())
    }

    /// Create a parser with custom selector configuration.
    pub fn with_selectors(selectors: &CallTableSelectors) -> ParsingResult<Self> {
        Ok(Self {
            row_selector: Self::compile(&selectors.rows)?,
            cell_selector: Self::compile(&selectors.cells)?,
            clickable_selector: Self::compile(&selectors.clickable)?,
        })
    }

    fn compile(selector: &str) -> ParsingResult<Selector> {
        Selector::parse(selector)
            .map_err(|e| ParsingError::invalid_selector(selector, &e.to_string()))
    }

    /// Parse the current page markup into an ordered sequence of call rows.
    pub fn parse(&self, page_html: &str) -> Vec<CallRecord> {
        let document = Html::parse_document(page_html);
        let mut calls = Vec::new();

        for row in document.select(&self.row_selector) {
            match self.parse_row(&row) {
                Ok(Some(call)) => calls.push(call),
                Ok(None) => {} // header/short row, not a call
                Err(e) => warn!("Skipping malformed call row: {}", e),
            }
        }

        debug!("Parsed {} call rows", calls.len());
        calls
    }

    /// Extract a single row. `Ok(None)` means the row is structurally not a
    /// call row (fewer than 3 columns) and is silently skipped.
    fn parse_row(&self, row: &ElementRef<'_>) -> ParsingResult<Option<CallRecord>> {
        let cells: Vec<ElementRef<'_>> = row.select(&self.cell_selector).collect();
        if cells.len() < MIN_COLUMNS {
            return Ok(None);
        }

        let country = extract_country(&cell_text(&cells[0]));
        let number = cell_text(&cells[1]);
        let cli_number = cell_text(&cells[2]);
        if cli_number.is_empty() {
            return Err(ParsingError::required_field_missing(
                "cli_number",
                Some("live-calls row"),
            ));
        }

        let status = CallStatus::from_cell(&cell_text(&cells[cells.len() - 1]));

        // Duration lives in one of the middle columns when present.
        let duration = if cells.len() > MIN_COLUMNS + 1 {
            cells[MIN_COLUMNS..cells.len() - 1]
                .iter()
                .find_map(|cell| parse_duration(&cell_text(cell)))
        } else {
            None
        };

        let audio = self.find_audio_ref(row);

        Ok(Some(CallRecord {
            country,
            number,
            cli_number,
            duration,
            audio,
            status,
        }))
    }

    /// Locate the row's play control and mine its handler for the
    /// (device, uuid) pair. A play control whose arguments don't match the
    /// pattern yields no audio reference.
    fn find_audio_ref(&self, row: &ElementRef<'_>) -> Option<AudioRef> {
        for element in row.select(&self.clickable_selector) {
            let Some(handler) = element.value().attr("onclick") else {
                continue;
            };
            if !handler.to_ascii_lowercase().contains("play") {
                continue;
            }
            match PLAY_HANDLER_RE.captures(handler) {
                Some(caps) => {
                    return Some(AudioRef {
                        device_id: caps[1].to_string(),
                        call_uuid: caps[2].to_string(),
                    });
                }
                None => {
                    debug!("Play control present but arguments unparseable: {}", handler);
                    return None;
                }
            }
        }
        None
    }
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Extract the country name from the first column's raw text.
///
/// Takes leading whitespace-separated tokens until one case-insensitively
/// equals `MOBILE`/`FIXED` or contains a digit; the accepted prefix is joined
/// with single spaces. If no token is accepted, the whole trimmed text is
/// returned unchanged.
pub fn extract_country(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut accepted: Vec<&str> = Vec::new();

    for token in trimmed.split_whitespace() {
        let terminator = token.eq_ignore_ascii_case("MOBILE")
            || token.eq_ignore_ascii_case("FIXED")
            || token.chars().any(|c| c.is_ascii_digit());
        if terminator {
            break;
        }
        accepted.push(token);
    }

    if accepted.is_empty() {
        trimmed.to_string()
    } else {
        accepted.join(" ")
    }
}

/// Parse a duration cell reading as `SS`, `MM:SS` or `HH:MM:SS`.
pub fn parse_duration(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut total: u64 = 0;
    for part in &parts {
        if part.is_empty() || part.len() > 4 {
            return None;
        }
        let value: u64 = part.parse().ok()?;
        total = total * 60 + value;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table id="livecalls"><tbody>
            <tr>
                <th>Country</th><th>Number</th>
            </tr>
            <tr>
                <td>UNITED KINGDOM MOBILE 07123</td>
                <td>447911223344</td>
                <td>447700900123</td>
                <td>00:42</td>
                <td><a onclick="playSound('dev-7','1f0a-22bc')">play</a></td>
                <td>ANSWERED</td>
            </tr>
            <tr>
                <td>SPAIN</td>
                <td>34911222333</td>
                <td>34600111222</td>
                <td></td>
                <td>FAILED</td>
            </tr>
        </tbody></table>
        <table><tbody id="lastactivity">
            <tr>
                <td>FRANCE FIXED 01</td>
                <td>33142334455</td>
                <td>33601020304</td>
                <td><span onclick="playSound(missing)">play</span></td>
                <td>answered</td>
            </tr>
        </tbody></table>
        </body></html>
    "#;

    #[test]
    fn parses_rows_from_both_sections_in_order() {
        let parser = CallTableParser::new().unwrap();
        let calls = parser.parse(PAGE);
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].cli_number, "447700900123");
        assert_eq!(calls[1].cli_number, "34600111222");
        assert_eq!(calls[2].cli_number, "33601020304");
    }

    #[test]
    fn short_rows_are_skipped() {
        let parser = CallTableParser::new().unwrap();
        let calls = parser.parse(PAGE);
        // The header row has 2 cells and never becomes a record.
        assert!(calls.iter().all(|c| !c.cli_number.is_empty()));
    }

    #[test]
    fn play_handler_yields_audio_ref() {
        let parser = CallTableParser::new().unwrap();
        let calls = parser.parse(PAGE);
        let audio = calls[0].audio.as_ref().expect("first row has audio");
        assert_eq!(audio.device_id, "dev-7");
        assert_eq!(audio.call_uuid, "1f0a-22bc");
        assert_eq!(calls[0].duration, Some(42));
    }

    #[test]
    fn malformed_play_handler_means_no_audio() {
        let parser = CallTableParser::new().unwrap();
        let calls = parser.parse(PAGE);
        assert_eq!(calls[2].status, CallStatus::Pending);
        assert!(calls[2].audio.is_none());
    }

    #[test]
    fn failed_status_is_classified() {
        let parser = CallTableParser::new().unwrap();
        let calls = parser.parse(PAGE);
        assert_eq!(calls[1].status, CallStatus::Failed);
        assert!(!calls[1].has_audio());
    }

    #[test]
    fn country_extraction_terminates_on_type_token() {
        assert_eq!(extract_country("UNITED KINGDOM MOBILE 07123"), "UNITED KINGDOM");
        assert_eq!(extract_country("FRANCE FIXED 01"), "FRANCE");
        assert_eq!(extract_country("SPAIN MOBILE"), "SPAIN");
    }

    #[test]
    fn country_extraction_terminates_on_digit_token() {
        assert_eq!(extract_country("GERMANY 49"), "GERMANY");
    }

    #[test]
    fn country_extraction_is_idempotent_without_terminators() {
        assert_eq!(extract_country("  NEW ZEALAND  "), "NEW ZEALAND");
        assert_eq!(extract_country(extract_country("NEW ZEALAND").as_str()), "NEW ZEALAND");
    }

    #[test]
    fn country_extraction_falls_back_to_trimmed_text() {
        // First token already terminates: nothing accepted, whole text kept.
        assert_eq!(extract_country(" 34 SPAIN "), "34 SPAIN");
        assert_eq!(extract_country("MOBILE"), "MOBILE");
    }

    #[test]
    fn duration_parsing_formats() {
        assert_eq!(parse_duration("42"), Some(42));
        assert_eq!(parse_duration("00:42"), Some(42));
        assert_eq!(parse_duration("01:02:03"), Some(3723));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("n/a"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
    }
}
