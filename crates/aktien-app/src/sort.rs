// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;

use crate::model::{CellValue, SortDirection, StockRow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

/// Selecting the sorted column flips its direction; selecting any other
/// column starts over ascending.
pub fn cycle_sort(current: Option<&SortSpec>, column: &str) -> SortSpec {
    match current {
        Some(spec) if spec.column == column => SortSpec {
            column: column.to_owned(),
            direction: match spec.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            },
        },
        _ => SortSpec {
            column: column.to_owned(),
            direction: SortDirection::Asc,
        },
    }
}

/// German phone-book folding so that "Österreich" sorts next to "Ost".
pub fn fold_german(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            'ä' | 'Ä' => folded.push('a'),
            'ö' | 'Ö' => folded.push('o'),
            'ü' | 'Ü' => folded.push('u'),
            'ß' => folded.push_str("ss"),
            _ => folded.extend(ch.to_lowercase()),
        }
    }
    folded
}

/// Compares two present cell values. Null handling lives in `sort_rows`,
/// where it must ignore the sort direction.
pub fn compare_cells(left: &CellValue, right: &CellValue) -> Ordering {
    match (left, right) {
        (CellValue::Number(left), CellValue::Number(right)) => left.total_cmp(right),
        (CellValue::Text(left), CellValue::Text(right)) => {
            fold_german(left).cmp(&fold_german(right))
        }
        _ => fold_german(&display_for_compare(left)).cmp(&fold_german(&display_for_compare(right))),
    }
}

fn display_for_compare(value: &CellValue) -> String {
    match value {
        CellValue::Number(value) => value.to_string(),
        CellValue::Text(value) => value.clone(),
        CellValue::Null => String::new(),
    }
}

/// Stable in-place sort by one column. Rows without a value for the column
/// sort last regardless of direction.
pub fn sort_rows(rows: &mut [StockRow], spec: &SortSpec) {
    rows.sort_by(|left, right| {
        let left_value = left.sort_value(&spec.column);
        let right_value = right.sort_value(&spec.column);

        match (left_value.is_null(), right_value.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        let ordering = compare_cells(&left_value, &right_value);
        match spec.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}
