// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::ids::{FavoriteRank, Isin};

/// Fixed display order for column groups; groups the server invents later
/// are appended alphabetically after these.
pub const COLUMN_GROUP_ORDER: [&str; 9] = [
    "Stammdaten",
    "Kursdaten",
    "Bewertung",
    "Durchschnitte",
    "KGV Abweichung",
    "EV/EBIT Abweichung",
    "Wachstum",
    "Bilanz",
    "Margen",
];

/// Categorical screener fields, in the order the filter form shows them.
pub const CATEGORICAL_FIELDS: [(&str, &str); 4] = [
    ("stock_index", "Index"),
    ("sector", "Sektor"),
    ("industry", "Branche"),
    ("country", "Land"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewKind {
    Watchlist,
    Screener,
}

impl ViewKind {
    pub const ALL: [Self; 2] = [Self::Watchlist, Self::Screener];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Watchlist => "watchlist",
            Self::Screener => "screener",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "watchlist" => Some(Self::Watchlist),
            "screener" => Some(Self::Screener),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Watchlist => "watchlist",
            Self::Screener => "screener",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailTab {
    Pe,
    EvEbit,
    Growth,
    Margins,
}

impl DetailTab {
    pub const ALL: [Self; 4] = [Self::Pe, Self::EvEbit, Self::Growth, Self::Margins];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pe => "KGV",
            Self::EvEbit => "EV/EBIT",
            Self::Growth => "Wachstum",
            Self::Margins => "Margen",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnFormat {
    #[default]
    Text,
    Number,
    Percent,
    Currency,
    Billions,
}

impl ColumnFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Percent => "percent",
            Self::Currency => "currency",
            Self::Billions => "billions",
        }
    }

    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub column_key: String,
    pub display_name: String,
    #[serde(default)]
    pub column_group: String,
    #[serde(default)]
    pub format_type: ColumnFormat,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub sort_order: i64,
}

/// One table cell as the server sends it: a number, a string, or nothing.
/// Sorting reads this typed value, never the formatted display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Null,
}

impl CellValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

/// One stock in a rendered table. Column values arrive as a flat JSON object
/// keyed by column key; everything that is not a named field lands in
/// `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRow {
    pub isin: Isin,
    #[serde(default, deserialize_with = "favorite_or_none")]
    pub favorite: FavoriteRank,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub notes: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, CellValue>,
}

impl StockRow {
    /// The typed side-channel value used for sorting and filtering. The
    /// favorite rank and note presence are addressable like columns.
    pub fn sort_value(&self, column: &str) -> CellValue {
        match column {
            "favorite" => CellValue::Number(f64::from(self.favorite.get())),
            "notes" => {
                if self.notes.is_empty() {
                    CellValue::Null
                } else {
                    CellValue::Text(self.notes.clone())
                }
            }
            _ => self
                .values
                .get(column)
                .cloned()
                .unwrap_or(CellValue::Null),
        }
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.values.get(column).and_then(CellValue::as_text)
    }

    pub fn company_name(&self) -> &str {
        self.text("company_name").unwrap_or("-")
    }
}

fn favorite_or_none<'de, D>(deserializer: D) -> Result<FavoriteRank, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<u8>::deserialize(deserializer)? {
        None => Ok(FavoriteRank::NONE),
        Some(raw) => FavoriteRank::try_from(raw).map_err(serde::de::Error::custom),
    }
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
}

impl CompareOp {
    pub const ALL: [Self; 5] = [Self::Lt, Self::Le, Self::Eq, Self::Ge, Self::Gt];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ge => ">=",
            Self::Gt => ">",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            "=" => Some(Self::Eq),
            ">=" => Some(Self::Ge),
            ">" => Some(Self::Gt),
            _ => None,
        }
    }

    pub const fn cycled(self) -> Self {
        match self {
            Self::Lt => Self::Le,
            Self::Le => Self::Eq,
            Self::Eq => Self::Ge,
            Self::Ge => Self::Gt,
            Self::Gt => Self::Lt,
        }
    }
}

/// One complete numeric screener constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericFilter {
    pub column: String,
    pub operator: CompareOp,
    pub value: f64,
}

/// The composed screener filter state. Serializes to the same JSON shape the
/// server accepts and the local store persists, so a saved set restores to an
/// equivalent value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numeric: Vec<NumericFilter>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.search.is_empty()
            && self.stock_index.is_none()
            && self.sector.is_none()
            && self.industry.is_none()
            && self.country.is_none()
            && self.numeric.is_empty()
    }

    pub fn categorical(&self, field: &str) -> Option<&str> {
        match field {
            "stock_index" => self.stock_index.as_deref(),
            "sector" => self.sector.as_deref(),
            "industry" => self.industry.as_deref(),
            "country" => self.country.as_deref(),
            _ => None,
        }
    }
}

/// Labels and visibility flags for favorite ranks 1-9. Missing entries fall
/// back to a numbered default label and to "visible".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FavoriteSettings {
    #[serde(default)]
    pub labels: BTreeMap<u8, String>,
    #[serde(default)]
    pub filters: BTreeMap<u8, bool>,
}

impl FavoriteSettings {
    pub fn label(&self, rank: u8) -> String {
        match self.labels.get(&rank) {
            Some(label) if !label.is_empty() => label.clone(),
            _ => format!("Favorit {rank}"),
        }
    }

    pub fn is_visible(&self, rank: u8) -> bool {
        self.filters.get(&rank).copied().unwrap_or(true)
    }

    pub fn set_label(&mut self, rank: u8, label: String) {
        self.labels.insert(rank, label);
    }

    pub fn toggle_visible(&mut self, rank: u8) {
        let current = self.is_visible(rank);
        self.filters.insert(rank, !current);
    }
}

/// Response of `POST /api/screener/filter` and the initial table state of a
/// view: the visible columns plus one row per matching stock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenerPage {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub stocks: Vec<StockRow>,
}

/// Response of `GET /api/columns/{view}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<ColumnDescriptor>>,
}

/// Response of `GET /api/filter-options`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub categorical: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub numeric: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailCompany {
    #[serde(default, alias = "company_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub fiscal_year_end: Option<String>,
}

/// One quarterly (or half-year) component of a trailing-twelve-month sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarterComponent {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub net_income: Option<f64>,
    #[serde(default)]
    pub operating_income: Option<f64>,
}

impl QuarterComponent {
    /// "Q2 2025" style label; the year is the date's leading four digits.
    pub fn label(&self) -> String {
        let period = self.period.as_deref().unwrap_or("");
        match self.date.as_deref().and_then(|date| date.get(..4)) {
            Some(year) => format!("{period} {year}"),
            None => period.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TtmCalculation {
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub ttm_net_income: Option<f64>,
    #[serde(default)]
    pub quarters: Vec<QuarterComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvCalculation {
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub net_debt: Option<f64>,
    #[serde(default)]
    pub minority_interest: Option<f64>,
    #[serde(default)]
    pub ttm_ebit: Option<f64>,
    #[serde(default)]
    pub quarters: Vec<QuarterComponent>,
}

impl EvCalculation {
    /// Market cap + net debt + minority interest; missing components count
    /// as zero, matching how the overview presents the sum.
    pub fn enterprise_value(&self) -> f64 {
        self.market_cap.unwrap_or(0.0)
            + self.net_debt.unwrap_or(0.0)
            + self.minority_interest.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeOverview {
    #[serde(default)]
    pub ttm_pe: Option<f64>,
    #[serde(default)]
    pub fy_pe: Option<f64>,
    #[serde(default)]
    pub pe_avg_5y: Option<f64>,
    #[serde(default)]
    pub pe_avg_10y: Option<f64>,
    #[serde(default)]
    pub pe_avg_15y: Option<f64>,
    #[serde(default)]
    pub pe_avg_20y: Option<f64>,
    #[serde(default)]
    pub pe_avg_10y_2019: Option<f64>,
    #[serde(default)]
    pub yf_ttm_pe: Option<f64>,
    #[serde(default)]
    pub yf_forward_pe: Option<f64>,
    #[serde(default)]
    pub yf_ttm_pe_vs_avg_5y: Option<f64>,
    #[serde(default)]
    pub yf_ttm_pe_vs_avg_10y: Option<f64>,
    #[serde(default)]
    pub yf_ttm_pe_vs_avg_15y: Option<f64>,
    #[serde(default)]
    pub yf_ttm_pe_vs_avg_20y: Option<f64>,
    #[serde(default)]
    pub yf_ttm_pe_vs_avg_10y_2019: Option<f64>,
    #[serde(default)]
    pub yf_fwd_pe_vs_avg_5y: Option<f64>,
    #[serde(default)]
    pub yf_fwd_pe_vs_avg_10y: Option<f64>,
    #[serde(default)]
    pub yf_fwd_pe_vs_avg_15y: Option<f64>,
    #[serde(default)]
    pub yf_fwd_pe_vs_avg_20y: Option<f64>,
    #[serde(default)]
    pub yf_fwd_pe_vs_avg_10y_2019: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvEbitOverview {
    #[serde(default)]
    pub ttm_ev_ebit: Option<f64>,
    #[serde(default)]
    pub fy_ev_ebit: Option<f64>,
    #[serde(default)]
    pub ev_ebit_avg_5y: Option<f64>,
    #[serde(default)]
    pub ev_ebit_avg_10y: Option<f64>,
    #[serde(default)]
    pub ev_ebit_avg_15y: Option<f64>,
    #[serde(default)]
    pub ev_ebit_avg_20y: Option<f64>,
    #[serde(default)]
    pub ev_ebit_avg_10y_2019: Option<f64>,
    #[serde(default)]
    pub ev_ebit_vs_avg_5y: Option<f64>,
    #[serde(default)]
    pub ev_ebit_vs_avg_10y: Option<f64>,
    #[serde(default)]
    pub ev_ebit_vs_avg_15y: Option<f64>,
    #[serde(default)]
    pub ev_ebit_vs_avg_20y: Option<f64>,
    #[serde(default)]
    pub ev_ebit_vs_avg_10y_2019: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthOverview {
    #[serde(default)]
    pub revenue_cagr_3y: Option<f64>,
    #[serde(default)]
    pub revenue_cagr_5y: Option<f64>,
    #[serde(default)]
    pub revenue_cagr_10y: Option<f64>,
    #[serde(default)]
    pub ebit_cagr_3y: Option<f64>,
    #[serde(default)]
    pub ebit_cagr_5y: Option<f64>,
    #[serde(default)]
    pub ebit_cagr_10y: Option<f64>,
    #[serde(default)]
    pub net_income_cagr_3y: Option<f64>,
    #[serde(default)]
    pub net_income_cagr_5y: Option<f64>,
    #[serde(default)]
    pub net_income_cagr_10y: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarginsOverview {
    #[serde(default)]
    pub profit_margin: Option<f64>,
    #[serde(default)]
    pub operating_margin: Option<f64>,
    #[serde(default)]
    pub profit_margin_avg_3y: Option<f64>,
    #[serde(default)]
    pub profit_margin_avg_5y: Option<f64>,
    #[serde(default)]
    pub profit_margin_avg_10y: Option<f64>,
    #[serde(default)]
    pub profit_margin_avg_5y_2019: Option<f64>,
    #[serde(default)]
    pub operating_margin_avg_3y: Option<f64>,
    #[serde(default)]
    pub operating_margin_avg_5y: Option<f64>,
    #[serde(default)]
    pub operating_margin_avg_10y: Option<f64>,
    #[serde(default)]
    pub operating_margin_avg_5y_2019: Option<f64>,
}

/// One fiscal year of the income statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiscalYear {
    pub year: i32,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub gross_profit: Option<f64>,
    #[serde(default)]
    pub operating_income: Option<f64>,
    #[serde(default)]
    pub net_income: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TtmIncomeStatement {
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub gross_profit: Option<f64>,
    #[serde(default)]
    pub operating_income: Option<f64>,
    #[serde(default)]
    pub net_income: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PePoint {
    pub year: i32,
    #[serde(default)]
    pub pe: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvEbitPoint {
    pub year: i32,
    #[serde(default)]
    pub ev_ebit: Option<f64>,
}

/// The composite drill-down payload of `GET /api/stock/{isin}/details`.
/// Cached in memory while the detail overlay has been opened; tab switches
/// re-render from this value without another fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockDetails {
    #[serde(default)]
    pub company: DetailCompany,
    #[serde(default)]
    pub ttm_calculation: TtmCalculation,
    #[serde(default)]
    pub pe_overview: PeOverview,
    #[serde(default)]
    pub ev_calculation: EvCalculation,
    #[serde(default)]
    pub ev_ebit_overview: EvEbitOverview,
    #[serde(default)]
    pub growth_overview: GrowthOverview,
    #[serde(default)]
    pub margins_overview: MarginsOverview,
    #[serde(default)]
    pub income_statement: Vec<FiscalYear>,
    #[serde(default)]
    pub ttm_income_statement: Option<TtmIncomeStatement>,
    #[serde(default)]
    pub pe_history: Vec<PePoint>,
    #[serde(default)]
    pub current_ttm_pe: Option<f64>,
    #[serde(default)]
    pub ev_ebit_history: Vec<EvEbitPoint>,
    #[serde(default)]
    pub current_ttm_ev_ebit: Option<f64>,
}

impl StockDetails {
    /// "TICKER | Sektor | Land | FJ: ..." header line under the company name.
    pub fn meta_line(&self) -> String {
        let company = &self.company;
        let mut line = format!(
            "{} | {} | {}",
            company.ticker.as_deref().unwrap_or("-"),
            company.sector.as_deref().unwrap_or("-"),
            company.country.as_deref().unwrap_or("-"),
        );
        if let Some(fiscal_year_end) = company.fiscal_year_end.as_deref()
            && !fiscal_year_end.is_empty()
        {
            line.push_str(" | FJ: ");
            line.push_str(fiscal_year_end);
        }
        line
    }
}

/// Response of `GET /api/stock/{isin}/info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub stock_index: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub fiscal_year_end: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
