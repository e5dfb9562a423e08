//! Cardinality reduction for ephemeral workload names
//!
//! Batch jobs are frequently created with a timestamp or UUID embedded in
//! their name (`report-27752145`, `sync-3f1c...`). Exported as-is, every
//! instance would become a new time series. This module folds such instances
//! into one logical name and sums their cost.

use crate::models::{CostRecord, ResourceKind};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Canonical 8-4-4-4-12 UUID, or an 8-digit run (compact timestamp)
static EPHEMERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}|[0-9]{8}",
    )
    .expect("ephemeral identifier regex")
});

const SEPARATORS: &[char] = &['-', '_', '.'];

/// Normalize a resource identifier by stripping embedded timestamps/UUIDs
///
/// Names without a match are returned unchanged. Otherwise separator runs
/// left behind are collapsed and leading/trailing separators trimmed. The
/// step is repeated until the name is stable, so the result is idempotent.
pub fn normalize_identifier(name: &str) -> String {
    let mut current = name.to_string();
    loop {
        match strip_once(&current) {
            Some(next) if next != current => current = next,
            _ => return current,
        }
    }
}

fn strip_once(name: &str) -> Option<String> {
    if !EPHEMERAL_RE.is_match(name) {
        return None;
    }

    let stripped = EPHEMERAL_RE.replace_all(name, "");
    let collapsed = collapse_separators(&stripped);
    Some(collapsed.trim_matches(SEPARATORS).to_string())
}

/// Collapse each run of separators to the run's first character
fn collapse_separators(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut previous_was_separator = false;

    for c in name.chars() {
        let is_separator = SEPARATORS.contains(&c);
        if !(is_separator && previous_was_separator) {
            out.push(c);
        }
        previous_was_separator = is_separator;
    }

    out
}

/// Merge the records of one namespace/kind bucket by normalized name
///
/// The first record encountered for a normalized name is kept as the
/// representative and carries the summed total. Storage and compute are left
/// as reported on the representative; only the total is additive here.
pub fn reduce_bucket(records: Vec<CostRecord>) -> Vec<CostRecord> {
    let mut reduced: Vec<CostRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for mut record in records {
        let normalized = normalize_identifier(&record.name);

        match index.get(&normalized) {
            Some(&i) => reduced[i].total += record.total,
            None => {
                index.insert(normalized.clone(), reduced.len());
                record.name = normalized;
                reduced.push(record);
            }
        }
    }

    reduced
}

/// Split records into `(namespace, kind)` buckets and reduce each one
///
/// Buckets keep the order in which they were first seen.
pub fn reduce_records(records: Vec<CostRecord>) -> Vec<CostRecord> {
    let mut buckets: Vec<Vec<CostRecord>> = Vec::new();
    let mut index: HashMap<(String, ResourceKind), usize> = HashMap::new();

    for record in records {
        let key = (record.namespace.clone(), record.kind.clone());
        let i = *index.entry(key).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[i].push(record);
    }

    buckets.into_iter().flat_map(reduce_bucket).collect()
}
