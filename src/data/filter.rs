use std::collections::{BTreeMap, BTreeSet};

use super::model::TaggedTable;
use crate::error::{DataShapeError, Result};

// ---------------------------------------------------------------------------
// Selection predicate: which tag values are selected per tag
// ---------------------------------------------------------------------------

/// Per-tag selection state: maps tag name → set of selected values.
/// A tag absent from the map is unconstrained.
pub type Selection = BTreeMap<String, BTreeSet<String>>;

/// Initialise a [`Selection`] with every value of every tag selected.
pub fn select_everything<I>(table: &TaggedTable<I>) -> Selection {
    table
        .tag_names()
        .iter()
        .filter_map(|tag| table.unique_values(tag).map(|vals| (tag.clone(), vals)))
        .collect()
}

/// Return the sub-table of columns that pass all selections.
///
/// A column passes a tag selection when:
/// * The tag is not present in `selection` → passes (no constraint)
/// * The selected set for that tag is empty → nothing selected → fails
/// * The column's value for that tag is in the selected set → passes
///
/// Selecting on a tag the table does not carry is an error.
pub fn select_columns<I: Clone>(table: &TaggedTable<I>, selection: &Selection) -> Result<TaggedTable<I>> {
    let mut constraints = Vec::with_capacity(selection.len());
    for (tag, selected) in selection {
        let pos = table
            .tag_position(tag)
            .ok_or_else(|| DataShapeError::UnknownTag(tag.clone()))?;
        constraints.push((pos, selected));
    }

    Ok(table.retain_columns(|key| {
        constraints.iter().all(|(pos, selected)| {
            // Nothing selected for this tag → hide everything
            !selected.is_empty() && key.get(*pos).is_some_and(|v| selected.contains(v))
        })
    }))
}
