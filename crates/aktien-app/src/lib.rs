// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod columns;
pub mod derive;
pub mod filters;
mod ids;
mod model;
mod sort;
mod state;

pub use columns::{ColumnUpdate, build_column_updates, flat_display_order, grouped_columns};
pub use derive::{GrowthRow, MarginRow, Tone, YearLabel, growth_rows, margin_rows};
pub use filters::{CategoricalSelection, NumericFilterRow, compose_filters, rows_from_filters};
pub use ids::{FavoriteRank, Isin};
pub use model::*;
pub use sort::{SortSpec, compare_cells, cycle_sort, fold_german, sort_rows};
pub use state::{AppCommand, AppEvent, AppState, DetailState};
