//! JSON output.

use crate::error::Result;
use crate::models::HeadlineRecord;

/// Pretty-printed JSON array; non-ASCII text is written as-is.
///
/// Serialization failures surface as [`ScrapeError::Json`](crate::ScrapeError::Json).
pub fn render(records: &[HeadlineRecord]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(records)?;
    json.push('\n');
    Ok(json)
}
