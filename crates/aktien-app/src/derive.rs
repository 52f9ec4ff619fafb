// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Client-side derivations for the growth and margin tabs. The server sends
//! the raw income-statement series; year-over-year growth and margins are
//! computed here.

use crate::model::{FiscalYear, TtmIncomeStatement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearLabel {
    Fiscal(i32),
    Ttm,
}

impl YearLabel {
    /// "'25" for fiscal years, "TTM" for the trailing row.
    pub fn short(self) -> String {
        match self {
            Self::Fiscal(year) => {
                let digits = year.rem_euclid(100);
                format!("'{digits:02}")
            }
            Self::Ttm => "TTM".to_owned(),
        }
    }

    pub const fn is_ttm(self) -> bool {
        matches!(self, Self::Ttm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Positive,
    Negative,
}

impl Tone {
    /// Tone of a growth rate or margin: gaining is good.
    pub fn for_rate(value: Option<f64>) -> Self {
        match value {
            None => Self::Neutral,
            Some(value) if value >= 0.0 => Self::Positive,
            Some(_) => Self::Negative,
        }
    }

    /// Tone of a deviation from an average valuation multiple: trading BELOW
    /// the historical average reads as positive, so the sign is inverted.
    pub fn for_multiple_deviation(value: Option<f64>) -> Self {
        match value {
            None => Self::Neutral,
            Some(value) if value < 0.0 => Self::Positive,
            Some(_) => Self::Negative,
        }
    }
}

/// Year-over-year growth in percent. Undefined (not a divide-by-zero
/// artifact) when either side is missing or zero.
pub fn yoy_growth(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    let previous = previous.filter(|value| *value != 0.0)?;
    let current = current.filter(|value| *value != 0.0)?;
    Some((current - previous) / previous.abs() * 100.0)
}

/// `part / revenue * 100`; undefined when either side is missing or zero.
pub fn margin_of(part: Option<f64>, revenue: Option<f64>) -> Option<f64> {
    let revenue = revenue.filter(|value| *value != 0.0)?;
    let part = part.filter(|value| *value != 0.0)?;
    Some(part / revenue * 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthRow {
    pub label: YearLabel,
    pub revenue: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub net_income: Option<f64>,
    pub net_income_growth: Option<f64>,
    pub profit_margin: Option<f64>,
}

/// One row per fiscal year plus a trailing TTM row (when TTM revenue is
/// present) whose growth compares against the last fiscal year.
pub fn growth_rows(years: &[FiscalYear], ttm: Option<&TtmIncomeStatement>) -> Vec<GrowthRow> {
    let mut rows: Vec<GrowthRow> = Vec::with_capacity(years.len() + 1);

    for (index, year) in years.iter().enumerate() {
        let previous = index.checked_sub(1).map(|prior| &years[prior]);
        rows.push(GrowthRow {
            label: YearLabel::Fiscal(year.year),
            revenue: year.revenue,
            revenue_growth: yoy_growth(previous.and_then(|prior| prior.revenue), year.revenue),
            net_income: year.net_income,
            net_income_growth: yoy_growth(
                previous.and_then(|prior| prior.net_income),
                year.net_income,
            ),
            profit_margin: margin_of(year.net_income, year.revenue),
        });
    }

    if let Some(ttm) = ttm
        && ttm.revenue.is_some()
    {
        let last = years.last();
        rows.push(GrowthRow {
            label: YearLabel::Ttm,
            revenue: ttm.revenue,
            revenue_growth: yoy_growth(last.and_then(|year| year.revenue), ttm.revenue),
            net_income: ttm.net_income,
            net_income_growth: yoy_growth(last.and_then(|year| year.net_income), ttm.net_income),
            profit_margin: margin_of(ttm.net_income, ttm.revenue),
        });
    }

    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarginRow {
    pub label: YearLabel,
    pub revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_income: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_income: Option<f64>,
    pub profit_margin: Option<f64>,
}

pub fn margin_rows(years: &[FiscalYear], ttm: Option<&TtmIncomeStatement>) -> Vec<MarginRow> {
    let mut rows: Vec<MarginRow> = Vec::with_capacity(years.len() + 1);

    for year in years {
        rows.push(MarginRow {
            label: YearLabel::Fiscal(year.year),
            revenue: year.revenue,
            gross_profit: year.gross_profit,
            gross_margin: margin_of(year.gross_profit, year.revenue),
            operating_income: year.operating_income,
            operating_margin: margin_of(year.operating_income, year.revenue),
            net_income: year.net_income,
            profit_margin: margin_of(year.net_income, year.revenue),
        });
    }

    if let Some(ttm) = ttm
        && ttm.revenue.is_some()
    {
        rows.push(MarginRow {
            label: YearLabel::Ttm,
            revenue: ttm.revenue,
            gross_profit: ttm.gross_profit,
            gross_margin: margin_of(ttm.gross_profit, ttm.revenue),
            operating_income: ttm.operating_income,
            operating_margin: margin_of(ttm.operating_income, ttm.revenue),
            net_income: ttm.net_income,
            profit_margin: margin_of(ttm.net_income, ttm.revenue),
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::{Tone, YearLabel, growth_rows, margin_of, margin_rows, yoy_growth};
    use crate::model::{FiscalYear, TtmIncomeStatement};

    fn year(year: i32, revenue: Option<f64>, net_income: Option<f64>) -> FiscalYear {
        FiscalYear {
            year,
            revenue,
            gross_profit: None,
            operating_income: None,
            net_income,
        }
    }

    #[test]
    fn growth_of_ten_percent() {
        assert_eq!(yoy_growth(Some(100.0), Some(110.0)), Some(10.0));
    }

    #[test]
    fn growth_is_undefined_for_zero_or_missing_previous() {
        assert_eq!(yoy_growth(Some(0.0), Some(110.0)), None);
        assert_eq!(yoy_growth(None, Some(110.0)), None);
    }

    #[test]
    fn growth_over_negative_base_uses_magnitude() {
        // -100 -> -50 improves by 50% of the base magnitude.
        assert_eq!(yoy_growth(Some(-100.0), Some(-50.0)), Some(50.0));
    }

    #[test]
    fn margin_is_undefined_without_revenue() {
        assert_eq!(margin_of(Some(10.0), None), None);
        assert_eq!(margin_of(Some(10.0), Some(0.0)), None);
        assert_eq!(margin_of(Some(25.0), Some(100.0)), Some(25.0));
    }

    #[test]
    fn growth_rows_derive_yoy_and_margin_per_year() {
        let years = vec![
            year(2023, Some(100.0), Some(10.0)),
            year(2024, Some(110.0), Some(22.0)),
        ];
        let rows = growth_rows(&years, None);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].revenue_growth, None);
        assert_eq!(rows[1].revenue_growth, Some(10.0));
        assert_eq!(rows[1].net_income_growth, Some(120.0));
        assert_eq!(rows[1].profit_margin, Some(20.0));
    }

    #[test]
    fn ttm_row_compares_against_last_fiscal_year() {
        let years = vec![year(2024, Some(200.0), Some(20.0))];
        let ttm = TtmIncomeStatement {
            revenue: Some(220.0),
            net_income: Some(11.0),
            ..TtmIncomeStatement::default()
        };

        let rows = growth_rows(&years, Some(&ttm));
        let last = rows.last().expect("ttm row");
        assert!(last.label.is_ttm());
        assert_eq!(last.revenue_growth, Some(10.0));
        assert_eq!(last.profit_margin, Some(5.0));
    }

    #[test]
    fn ttm_row_is_skipped_without_ttm_revenue() {
        let years = vec![year(2024, Some(200.0), Some(20.0))];
        let ttm = TtmIncomeStatement::default();
        assert_eq!(growth_rows(&years, Some(&ttm)).len(), 1);
        assert_eq!(margin_rows(&years, Some(&ttm)).len(), 1);
    }

    #[test]
    fn margin_rows_cover_all_three_margins() {
        let years = vec![FiscalYear {
            year: 2024,
            revenue: Some(100.0),
            gross_profit: Some(60.0),
            operating_income: Some(30.0),
            net_income: Some(15.0),
        }];
        let rows = margin_rows(&years, None);
        assert_eq!(rows[0].gross_margin, Some(60.0));
        assert_eq!(rows[0].operating_margin, Some(30.0));
        assert_eq!(rows[0].profit_margin, Some(15.0));
    }

    #[test]
    fn year_labels_shorten_to_two_digits() {
        assert_eq!(YearLabel::Fiscal(2025).short(), "'25");
        assert_eq!(YearLabel::Fiscal(2009).short(), "'09");
        assert_eq!(YearLabel::Ttm.short(), "TTM");
    }

    #[test]
    fn multiple_deviation_tone_inverts_the_sign() {
        assert_eq!(Tone::for_multiple_deviation(Some(-12.0)), Tone::Positive);
        assert_eq!(Tone::for_multiple_deviation(Some(3.0)), Tone::Negative);
        assert_eq!(Tone::for_multiple_deviation(None), Tone::Neutral);
    }

    #[test]
    fn rate_tone_keeps_the_sign() {
        assert_eq!(Tone::for_rate(Some(4.0)), Tone::Positive);
        assert_eq!(Tone::for_rate(Some(0.0)), Tone::Positive);
        assert_eq!(Tone::for_rate(Some(-1.0)), Tone::Negative);
    }
}
