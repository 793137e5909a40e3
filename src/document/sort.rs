//! Canonical key ordering for saved documents.

use std::cmp::Ordering;

use super::node::{MapEntry, Node, NodeKind};

/// Keys written first, in this order, in every mapping.
pub const KEY_SORT_PRIORITY: &[&str] = &[
    "kind",
    "name",
    "type",
    "moniker",
    "artifactReference",
    "container",
    "locations",
    "application",
    "artifacts",
    "environments",
];

/// Reorders every mapping in the tree: priority keys first, then the rest
/// by byte order. Comments move with their entries.
pub fn sort_keys(node: &mut Node) {
    match &mut node.kind {
        NodeKind::Mapping(entries) => {
            entries.sort_by(compare_entries);
            for entry in entries.iter_mut() {
                sort_keys(&mut entry.value);
            }
        }
        NodeKind::Sequence(items) => {
            for item in items.iter_mut() {
                sort_keys(item);
            }
        }
        NodeKind::Scalar(_) => {}
    }
}

fn priority(key: &str) -> usize {
    KEY_SORT_PRIORITY
        .iter()
        .position(|p| *p == key)
        .unwrap_or(KEY_SORT_PRIORITY.len())
}

fn compare_entries(a: &MapEntry, b: &MapEntry) -> Ordering {
    let a = a.key.key_text().unwrap_or_default();
    let b = b.key.key_text().unwrap_or_default();
    priority(&a).cmp(&priority(&b)).then_with(|| a.cmp(&b))
}
