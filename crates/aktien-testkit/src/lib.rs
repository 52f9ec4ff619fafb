// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Canned API payloads and store helpers shared by the unit and integration
//! tests. The numbers are small and hand-picked so derived values (growth,
//! margins, deviations) are easy to assert against.

use anyhow::Result;
use serde_json::json;

use aktien_app::{
    ColumnConfig, ColumnDescriptor, ColumnFormat, EvEbitPoint, FavoriteSettings, FilterOptions,
    FiscalYear, PePoint, ScreenerPage, StockDetails, StockInfo, StockRow, TtmIncomeStatement,
    ViewKind,
};
use aktien_store::Store;

/// An in-memory store with the schema in place.
pub fn memory_store() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

pub fn column(
    key: &str,
    name: &str,
    group: &str,
    format: ColumnFormat,
    visible: bool,
    sort_order: i64,
) -> ColumnDescriptor {
    ColumnDescriptor {
        column_key: key.to_owned(),
        display_name: name.to_owned(),
        column_group: group.to_owned(),
        format_type: format,
        is_visible: visible,
        sort_order,
    }
}

pub fn sample_columns() -> Vec<ColumnDescriptor> {
    vec![
        column("company_name", "Name", "Stammdaten", ColumnFormat::Text, true, 1),
        column("ticker", "Ticker", "Stammdaten", ColumnFormat::Text, false, 2),
        column("price", "Kurs", "Kursdaten", ColumnFormat::Currency, true, 3),
        column(
            "market_cap",
            "Market Cap",
            "Kursdaten",
            ColumnFormat::Billions,
            false,
            4,
        ),
        column("ttm_pe", "TTM-KGV", "Bewertung", ColumnFormat::Number, true, 5),
        column(
            "ttm_ev_ebit",
            "TTM EV/EBIT",
            "Bewertung",
            ColumnFormat::Number,
            true,
            6,
        ),
        column(
            "revenue_cagr_5y",
            "Umsatz CAGR 5J",
            "Wachstum",
            ColumnFormat::Percent,
            false,
            7,
        ),
        column(
            "profit_margin",
            "Gewinnmarge",
            "Margen",
            ColumnFormat::Percent,
            false,
            8,
        ),
    ]
}

pub fn sample_column_config() -> ColumnConfig {
    let columns = sample_columns();
    let mut config = ColumnConfig {
        columns: columns.clone(),
        ..ColumnConfig::default()
    };
    for descriptor in columns {
        config
            .groups
            .entry(descriptor.column_group.clone())
            .or_default()
            .push(descriptor);
    }
    config
}

pub fn stock_row(isin: &str, name: &str, favorite: u8, ttm_pe: Option<f64>) -> StockRow {
    let payload = json!({
        "isin": isin,
        "favorite": favorite,
        "notes": "",
        "company_name": name,
        "price": 101.5,
        "ttm_pe": ttm_pe,
        "ttm_ev_ebit": ttm_pe.map(|pe| pe * 0.8),
    });
    serde_json::from_value(payload).expect("build stock row fixture")
}

pub fn sample_screener_page() -> ScreenerPage {
    let columns = sample_columns()
        .into_iter()
        .filter(|column| column.is_visible)
        .collect();
    let stocks = vec![
        stock_row("DE0007164600", "SAP SE", 1, Some(24.5)),
        stock_row("DE0008404005", "Allianz SE", 0, Some(11.2)),
        stock_row("US0378331005", "Apple Inc.", 2, None),
    ];
    ScreenerPage {
        count: stocks.len(),
        columns,
        stocks,
    }
}

pub fn sample_filter_options() -> FilterOptions {
    let mut options = FilterOptions::default();
    options.categorical.insert(
        "stock_index".to_owned(),
        vec!["DAX".to_owned(), "S&P 500".to_owned()],
    );
    options.categorical.insert(
        "sector".to_owned(),
        vec!["Financials".to_owned(), "Technology".to_owned()],
    );
    options.categorical.insert(
        "industry".to_owned(),
        vec!["Insurance".to_owned(), "Software".to_owned()],
    );
    options.categorical.insert(
        "country".to_owned(),
        vec!["Deutschland".to_owned(), "USA".to_owned()],
    );
    options.numeric = sample_columns()
        .into_iter()
        .filter(|column| column.format_type.is_numeric())
        .collect();
    options
}

pub fn sample_favorite_settings() -> FavoriteSettings {
    let mut settings = FavoriteSettings::default();
    settings.set_label(1, "Kaufen".to_owned());
    settings.set_label(2, "Beobachten".to_owned());
    settings.toggle_visible(3);
    settings
}

/// A detail payload whose derived values are round numbers: revenue grows
/// 100 -> 110 (+10%), the TTM P/E of 20 sits 20% under the 10y average of 25.
pub fn sample_details() -> StockDetails {
    StockDetails {
        company: serde_json::from_value(json!({
            "company_name": "SAP SE",
            "ticker": "SAP",
            "sector": "Technology",
            "industry": "Software",
            "country": "Deutschland",
            "currency": "EUR",
            "fiscal_year_end": "31.12.",
        }))
        .expect("build company fixture"),
        ttm_calculation: serde_json::from_value(json!({
            "market_cap": 200.0e9,
            "ttm_net_income": 10.0e9,
            "quarters": [
                {"period": "Q3", "date": "2024-09-30", "net_income": 2.0e9, "operating_income": 3.0e9},
                {"period": "Q4", "date": "2024-12-31", "net_income": 3.0e9, "operating_income": 3.5e9},
                {"period": "Q1", "date": "2025-03-31", "net_income": 2.5e9, "operating_income": 3.0e9},
                {"period": "Q2", "date": "2025-06-30", "net_income": 2.5e9, "operating_income": 3.5e9},
            ],
        }))
        .expect("build ttm fixture"),
        pe_overview: serde_json::from_value(json!({
            "yf_ttm_pe": 20.0,
            "yf_forward_pe": 18.0,
            "pe_avg_5y": 22.0,
            "pe_avg_10y": 25.0,
            "yf_ttm_pe_vs_avg_5y": -9.1,
            "yf_ttm_pe_vs_avg_10y": -20.0,
            "yf_fwd_pe_vs_avg_10y": -28.0,
        }))
        .expect("build pe overview fixture"),
        ev_calculation: serde_json::from_value(json!({
            "market_cap": 200.0e9,
            "net_debt": 10.0e9,
            "minority_interest": 1.0e9,
            "ttm_ebit": 13.0e9,
            "quarters": [
                {"period": "Q3", "date": "2024-09-30", "operating_income": 3.0e9},
                {"period": "Q4", "date": "2024-12-31", "operating_income": 3.5e9},
                {"period": "Q1", "date": "2025-03-31", "operating_income": 3.0e9},
                {"period": "Q2", "date": "2025-06-30", "operating_income": 3.5e9},
            ],
        }))
        .expect("build ev fixture"),
        ev_ebit_overview: serde_json::from_value(json!({
            "ttm_ev_ebit": 16.2,
            "fy_ev_ebit": 17.0,
            "ev_ebit_avg_10y": 18.0,
            "ev_ebit_vs_avg_10y": -10.0,
        }))
        .expect("build ev/ebit overview fixture"),
        growth_overview: serde_json::from_value(json!({
            "revenue_cagr_3y": 8.0,
            "revenue_cagr_5y": 7.0,
            "revenue_cagr_10y": 6.5,
            "ebit_cagr_5y": 5.0,
            "net_income_cagr_5y": 4.0,
        }))
        .expect("build growth overview fixture"),
        margins_overview: serde_json::from_value(json!({
            "profit_margin": 10.0,
            "operating_margin": 12.5,
            "profit_margin_avg_5y": 9.0,
            "operating_margin_avg_5y": 12.0,
        }))
        .expect("build margins overview fixture"),
        income_statement: vec![
            FiscalYear {
                year: 2023,
                revenue: Some(100.0e9),
                gross_profit: Some(70.0e9),
                operating_income: Some(12.0e9),
                net_income: Some(9.0e9),
            },
            FiscalYear {
                year: 2024,
                revenue: Some(110.0e9),
                gross_profit: Some(77.0e9),
                operating_income: Some(13.0e9),
                net_income: Some(11.0e9),
            },
        ],
        ttm_income_statement: Some(TtmIncomeStatement {
            revenue: Some(115.0e9),
            gross_profit: Some(80.0e9),
            operating_income: Some(13.0e9),
            net_income: Some(10.0e9),
        }),
        pe_history: vec![
            PePoint {
                year: 2023,
                pe: Some(28.0),
            },
            PePoint {
                year: 2024,
                pe: Some(22.0),
            },
        ],
        current_ttm_pe: Some(20.0),
        ev_ebit_history: vec![
            EvEbitPoint {
                year: 2023,
                ev_ebit: Some(19.0),
            },
            EvEbitPoint {
                year: 2024,
                ev_ebit: Some(17.5),
            },
        ],
        current_ttm_ev_ebit: Some(16.2),
    }
}

pub fn sample_stock_info() -> StockInfo {
    serde_json::from_value(json!({
        "company_name": "SAP SE",
        "ticker": "SAP",
        "sector": "Technology",
        "industry": "Software",
        "country": "Deutschland",
        "stock_index": "DAX",
        "currency": "EUR",
        "fiscal_year_end": "31.12.",
        "description": "SAP SE entwickelt Unternehmenssoftware.",
    }))
    .expect("build stock info fixture")
}

/// JSON bodies for mock HTTP servers.
pub fn sample_details_json() -> String {
    serde_json::to_string(&sample_details()).expect("encode details fixture")
}

pub fn sample_screener_page_json() -> String {
    serde_json::to_string(&sample_screener_page()).expect("encode screener fixture")
}

pub fn load_view_page(view: ViewKind) -> ScreenerPage {
    let mut page = sample_screener_page();
    if view == ViewKind::Watchlist {
        page.stocks.retain(|row| row.favorite.is_ranked());
        page.count = page.stocks.len();
    }
    page
}
