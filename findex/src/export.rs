//! CSV rendering and path grouping over flat records.
//!
//! Pure string/collection work; writing the output anywhere is the
//! caller's business.

use std::collections::BTreeMap;

use crate::models::FlatRecord;

/// Group label for records that sit at the tree root (empty path).
pub const ROOT_GROUP: &str = "(root)";

const CSV_HEADER: [&str; 3] = ["title", "url", "path"];

/// Render records as CSV: fixed `title,url,path` header, every cell quoted
/// with `""` escaping, CRLF line endings.
pub fn to_csv(records: &[FlatRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(
        CSV_HEADER
            .iter()
            .map(|header| csv_cell(header))
            .collect::<Vec<_>>()
            .join(","),
    );
    for record in records {
        lines.push(
            [
                csv_cell(&record.title),
                csv_cell(&record.url),
                csv_cell(&record.path),
            ]
            .join(","),
        );
    }
    lines.join("\r\n")
}

fn csv_cell(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Bucket records by `path` in sorted path order, preserving record order
/// within each bucket. The empty path maps to [`ROOT_GROUP`].
pub fn group_by_path(records: &[FlatRecord]) -> BTreeMap<String, Vec<&FlatRecord>> {
    let mut groups: BTreeMap<String, Vec<&FlatRecord>> = BTreeMap::new();
    for record in records {
        let key = if record.path.is_empty() {
            ROOT_GROUP.to_string()
        } else {
            record.path.clone()
        };
        groups.entry(key).or_default().push(record);
    }
    groups
}
