//! Search filtering for the feed

use crate::models::PhotoRecord;

/// Maximum length of a search query
pub const MAX_QUERY_LEN: usize = 15;

/// Punctuation accepted in the search box besides ASCII letters and digits
const ALLOWED_SYMBOLS: &str = "!@#$%^&*():.”";

/// Whether `record` matches `query`.
///
/// The ID must contain the query verbatim; the author matches ignoring case.
/// An empty query matches everything.
pub fn matches(record: &PhotoRecord, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    record.id.contains(query) || record.author.to_lowercase().contains(&query.to_lowercase())
}

/// Records matching `query`, in their original order
pub fn filter_records(records: &[PhotoRecord], query: &str) -> Vec<PhotoRecord> {
    records
        .iter()
        .filter(|record| matches(record, query))
        .cloned()
        .collect()
}

/// Apply the search box input rules: drop characters outside ASCII letters,
/// digits and `!@#$%^&*():.”`, then keep at most [`MAX_QUERY_LEN`] characters.
pub fn sanitize_query(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || ALLOWED_SYMBOLS.contains(*c))
        .take(MAX_QUERY_LEN)
        .collect()
}
