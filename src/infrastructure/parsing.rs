//! HTML parsing infrastructure for the live-calls view
//!
//! Row extraction over the dashboard's rendered markup, with row-level
//! error recovery and configurable selectors.

pub mod call_table;
pub mod error;

// Re-export public types
pub use call_table::{extract_country, parse_duration, CallTableParser, CallTableSelectors};
pub use error::{ParsingError, ParsingResult};
