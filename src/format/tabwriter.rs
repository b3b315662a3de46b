//! Elastic tabstops for table output.
//!
//! Tab-terminated cells in consecutive lines form a column and are padded to the
//! widest cell plus three spaces, never narrower than 10 characters in total. The
//! trailing cell of a line is never padded.

use std::io::Write;

use tabwriter::TabWriter;

/// Minimum cell width, not counting the padding.
const MIN_WIDTH: usize = 7;
const PADDING: usize = 3;

/// Aligns the tab-separated cells of `text`.
///
/// ```
/// # use creo_stats::format::align_tabs;
/// assert_eq!(align_tabs("CONTAINER\tCPU %\n"), "CONTAINER   CPU %\n");
/// ```
pub fn align_tabs(text: &str) -> String {
    let mut writer = TabWriter::new(Vec::with_capacity(text.len() * 2))
        .minwidth(MIN_WIDTH)
        .padding(PADDING);
    if let Err(err) = writer.write_all(text.as_bytes()) {
        log::warn!("failed to align table: {err}");
        return text.to_owned();
    }
    // Flushing into memory does not fail and the cells are copied verbatim.
    match writer.into_inner().map(String::from_utf8) {
        Ok(Ok(aligned)) => aligned,
        _ => text.to_owned(),
    }
}
