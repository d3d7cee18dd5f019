//! Display-name substring filter over the record collection.
//!
//! # Responsibility
//! - Derive the read-only list projection shown for a filter string.
//!
//! # Invariants
//! - Pure: no caching, no side effects, recomputed per call.
//! - Store order is preserved.
//! - Matching is case-insensitive; an empty filter matches everything.

use crate::model::record::Record;

/// Returns the records whose display name contains `needle`, case-insensitively.
pub fn filter_records<'a>(records: &'a [Record], needle: &str) -> Vec<&'a Record> {
    if needle.is_empty() {
        return records.iter().collect();
    }

    let needle = needle.to_lowercase();
    records
        .iter()
        .filter(|record| record.display_name().to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::filter_records;
    use crate::model::record::Record;

    fn named(id: &str, name: &str) -> Record {
        let mut record = Record::default().with_id(id);
        record.set("formatBezeichnung", name).unwrap();
        record
    }

    #[test]
    fn matches_non_ascii_case_insensitively() {
        let records = vec![named("1", "Planziegel ÖKO"), named("2", "Füllziegel")];
        let hits = filter_records(&records, "öko");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id().as_str(), "1");
    }

    #[test]
    fn whitespace_needle_is_matched_literally() {
        let records = vec![named("1", "F 100"), named("2", "F100")];
        let hits = filter_records(&records, " ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id().as_str(), "1");
    }
}
