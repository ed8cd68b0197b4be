use crate::domain::{DATASET_DIR, SPREADSHEET_EXT};
use crate::tree::{ChangeTree, NodeId};
use std::collections::{BTreeMap, BTreeSet};

/// Node ids flagged for large-file tracking. Never contains a spreadsheet
/// path; those always go through the structured-data write path.
pub type SelectionSet = BTreeSet<String>;

/// Path to "fully tracked" flag, sourced from `git lfs ls-files`.
pub type TrackedFileMap = BTreeMap<String, bool>;

/// Checkbox tri-state toggle: a fully selected subtree is cleared, anything
/// less (partial or empty) becomes fully selected. Spreadsheets never count:
/// they can never be selected, so fullness is judged over the remaining
/// leaves and toggling twice round-trips.
pub fn toggle(tree: &ChangeTree, selection: &mut SelectionSet, node: NodeId) {
    let leaves: Vec<&str> = tree
        .leaves(node)
        .map(|id| tree.node(id).id.as_str())
        .filter(|id| !id.ends_with(SPREADSHEET_EXT))
        .collect();

    let selected = leaves.iter().filter(|id| selection.contains(**id)).count();
    if selected == leaves.len() {
        for id in &leaves {
            selection.remove(*id);
        }
    } else {
        for id in &leaves {
            selection.insert((*id).to_string());
        }
    }

    strip_spreadsheets(selection);
}

/// Recomputes the selection from scratch, discarding prior manual choices.
/// A leaf qualifies when it sits under a `dataset` directory, meets the size
/// threshold, or is already lfs-tracked.
pub fn default_selection(
    tree: &ChangeTree,
    tracked: &TrackedFileMap,
    threshold_bytes: u64,
) -> SelectionSet {
    let mut selection = SelectionSet::new();
    for leaf in tree.leaves(tree.root()) {
        if leaf == tree.root() {
            continue;
        }
        let node = tree.node(leaf);
        if under_dataset_dir(&node.id)
            || node.size >= threshold_bytes
            || tracked.contains_key(&node.id)
        {
            selection.insert(node.id.clone());
        }
    }

    strip_spreadsheets(&mut selection);
    selection
}

fn strip_spreadsheets(selection: &mut SelectionSet) {
    selection.retain(|id| !id.ends_with(SPREADSHEET_EXT));
}

fn under_dataset_dir(id: &str) -> bool {
    let segments: Vec<&str> = id.split('/').collect();
    segments[..segments.len().saturating_sub(1)]
        .iter()
        .any(|segment| segment.eq_ignore_ascii_case(DATASET_DIR))
}
