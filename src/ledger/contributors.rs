//! Named-contributor directory derived from the ledger
//!
//! Groups entries by contributor key (handle, else name) in first-seen
//! order. The first N distinct contributors occupy the genesis slots.

use serde::Serialize;

use super::LedgerEntry;

/// One row of the contributor directory
#[derive(Debug, Clone, Serialize)]
pub struct ContributorRecord {
    /// Grouping key: handle when present, else name
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Ledger entries attributed to this contributor
    pub entries: usize,
    /// Completion entries among them
    pub completions: usize,
    /// Id of the earliest attributed entry
    pub first_entry_id: u64,
    /// Whether this contributor occupies a genesis slot
    pub genesis: bool,
}

/// Build the directory from a chain, in first-seen order. Entries without
/// a named contributor are not listed.
pub fn contributor_directory(
    entries: &[LedgerEntry],
    genesis_slots: usize,
) -> Vec<ContributorRecord> {
    let mut records: Vec<ContributorRecord> = Vec::new();

    for entry in entries {
        let Some(contributor) = &entry.contributor else {
            continue;
        };
        let Some(key) = contributor.key() else {
            continue;
        };

        if let Some(record) = records.iter_mut().find(|r| r.key == key) {
            record.entries += 1;
            if entry.kind == super::EntryKind::Completion {
                record.completions += 1;
            }
            // Fill attribution fields a later entry supplies
            if record.name.is_none() {
                record.name = contributor.name.clone();
            }
            if record.handle.is_none() {
                record.handle = contributor.handle.clone();
            }
        } else {
            records.push(ContributorRecord {
                key: key.to_string(),
                name: contributor.name.clone(),
                handle: contributor.handle.clone(),
                entries: 1,
                completions: usize::from(entry.kind == super::EntryKind::Completion),
                first_entry_id: entry.id,
                genesis: records.len() < genesis_slots,
            });
        }
    }

    records
}
