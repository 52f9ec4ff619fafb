// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::model::{COLUMN_GROUP_ORDER, ColumnDescriptor};

/// One entry of the `POST /api/columns/{view}` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnUpdate {
    pub column_key: String,
    pub is_visible: bool,
    pub sort_order: i64,
}

/// Groups in the fixed display order, followed by unknown groups in
/// alphabetical order. Columns within a group are ordered by their stored
/// sort order.
pub fn grouped_columns(
    groups: &BTreeMap<String, Vec<ColumnDescriptor>>,
) -> Vec<(String, Vec<ColumnDescriptor>)> {
    let mut ordered = Vec::new();
    for group_name in COLUMN_GROUP_ORDER {
        if let Some(columns) = groups.get(group_name) {
            ordered.push((group_name.to_owned(), sorted_by_order(columns)));
        }
    }
    for (group_name, columns) in groups {
        if !COLUMN_GROUP_ORDER.contains(&group_name.as_str()) {
            ordered.push((group_name.clone(), sorted_by_order(columns)));
        }
    }
    ordered
}

/// All columns flattened in display order; this is the "encountered order"
/// hidden columns keep in the save payload.
pub fn flat_display_order(groups: &BTreeMap<String, Vec<ColumnDescriptor>>) -> Vec<ColumnDescriptor> {
    grouped_columns(groups)
        .into_iter()
        .flat_map(|(_, columns)| columns)
        .collect()
}

fn sorted_by_order(columns: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
    let mut sorted = columns.to_vec();
    sorted.sort_by_key(|column| column.sort_order);
    sorted
}

/// Builds the full update list: visible columns numbered 1..N in their
/// displayed order, then every remaining column as hidden, continuing the
/// numbering. Each key appears exactly once; keys in `ordered_visible` that
/// are not part of the configuration are ignored.
pub fn build_column_updates(
    ordered_visible: &[String],
    all_columns: &[ColumnDescriptor],
) -> Vec<ColumnUpdate> {
    let known: BTreeSet<&str> = all_columns
        .iter()
        .map(|column| column.column_key.as_str())
        .collect();

    let mut updates = Vec::with_capacity(all_columns.len());
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut sort_order = 1;

    for key in ordered_visible {
        if !known.contains(key.as_str()) || !seen.insert(key.as_str()) {
            continue;
        }
        updates.push(ColumnUpdate {
            column_key: key.clone(),
            is_visible: true,
            sort_order,
        });
        sort_order += 1;
    }

    for column in all_columns {
        if !seen.insert(column.column_key.as_str()) {
            continue;
        }
        updates.push(ColumnUpdate {
            column_key: column.column_key.clone(),
            is_visible: false,
            sort_order,
        });
        sort_order += 1;
    }

    updates
}
