// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::model::{CompareOp, FilterSet, NumericFilter};

/// One editable numeric constraint row in the filter form. The value stays
/// raw text while editing; only rows with a column and a parseable value make
/// it into the submitted filter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericFilterRow {
    pub column: String,
    pub operator: CompareOp,
    pub value: String,
}

impl NumericFilterRow {
    pub fn blank() -> Self {
        Self {
            column: String::new(),
            operator: CompareOp::Lt,
            value: String::new(),
        }
    }

    pub fn to_filter(&self) -> Option<NumericFilter> {
        if self.column.trim().is_empty() {
            return None;
        }
        let value = self.value.trim().parse::<f64>().ok()?;
        Some(NumericFilter {
            column: self.column.clone(),
            operator: self.operator,
            value,
        })
    }
}

impl From<&NumericFilter> for NumericFilterRow {
    fn from(filter: &NumericFilter) -> Self {
        Self {
            column: filter.column.clone(),
            operator: filter.operator,
            value: filter.value.to_string(),
        }
    }
}

/// The four categorical select values of the filter form; `None` means
/// "Alle".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoricalSelection {
    pub stock_index: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
}

impl CategoricalSelection {
    pub fn from_filters(set: &FilterSet) -> Self {
        Self {
            stock_index: set.stock_index.clone(),
            sector: set.sector.clone(),
            industry: set.industry.clone(),
            country: set.country.clone(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            "stock_index" => self.stock_index.as_deref(),
            "sector" => self.sector.as_deref(),
            "industry" => self.industry.as_deref(),
            "country" => self.country.as_deref(),
            _ => None,
        }
    }

    pub fn set(&mut self, field: &str, value: Option<String>) {
        let slot = match field {
            "stock_index" => &mut self.stock_index,
            "sector" => &mut self.sector,
            "industry" => &mut self.industry,
            "country" => &mut self.country,
            _ => return,
        };
        *slot = value.filter(|value| !value.is_empty());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Merges the live form state into the filter set that is persisted and
/// submitted. Incomplete numeric rows are dropped here, nowhere else.
pub fn compose_filters(
    search: &str,
    categorical: &CategoricalSelection,
    rows: &[NumericFilterRow],
) -> FilterSet {
    FilterSet {
        search: search.trim().to_owned(),
        stock_index: categorical.stock_index.clone(),
        sector: categorical.sector.clone(),
        industry: categorical.industry.clone(),
        country: categorical.country.clone(),
        numeric: rows.iter().filter_map(NumericFilterRow::to_filter).collect(),
    }
}

/// Rebuilds editable rows from a restored filter set. The form always shows
/// at least one (blank) row.
pub fn rows_from_filters(set: &FilterSet) -> Vec<NumericFilterRow> {
    if set.numeric.is_empty() {
        return vec![NumericFilterRow::blank()];
    }
    set.numeric.iter().map(NumericFilterRow::from).collect()
}
