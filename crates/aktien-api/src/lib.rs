// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Blocking client for the stock-analysis REST API. Transport failures and
//! non-2xx responses both map to one error path; the server's
//! `{"error": "..."}` envelope is surfaced when present.

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use aktien_app::{
    ColumnConfig, ColumnUpdate, FavoriteRank, FavoriteSettings, FilterOptions, FilterSet, Isin,
    ScreenerPage, StockDetails, StockInfo, ViewKind,
};

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("server.base_url must not be empty");
        }
        url::Url::parse(&base_url)
            .with_context(|| format!("server.base_url {base_url:?} is not a valid URL"))?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_favorite(&self, isin: &Isin, favorite: FavoriteRank) -> Result<()> {
        self.post_ok(
            "/api/favorite",
            &FavoritePayload {
                isin: isin.as_str(),
                favorite: favorite.get(),
            },
        )
    }

    pub fn set_note(&self, isin: &Isin, notes: &str) -> Result<()> {
        self.post_ok(
            "/api/note",
            &NotePayload {
                isin: isin.as_str(),
                notes,
            },
        )
    }

    pub fn favorite_settings(&self) -> Result<FavoriteSettings> {
        self.get_json("/api/favorite-settings", "decode favorite settings")
    }

    pub fn save_favorite_settings(&self, settings: &FavoriteSettings) -> Result<()> {
        self.post_ok("/api/favorite-settings", settings)
    }

    pub fn columns(&self, view: ViewKind) -> Result<ColumnConfig> {
        self.get_json(
            &format!("/api/columns/{}", view.as_str()),
            "decode column configuration",
        )
    }

    pub fn save_columns(&self, view: ViewKind, updates: &[ColumnUpdate]) -> Result<()> {
        self.post_ok(
            &format!("/api/columns/{}", view.as_str()),
            &ColumnsPayload { columns: updates },
        )
    }

    pub fn filter_options(&self) -> Result<FilterOptions> {
        self.get_json("/api/filter-options", "decode filter options")
    }

    pub fn run_screener(&self, filters: &FilterSet) -> Result<ScreenerPage> {
        let response = self
            .http
            .post(format!("{}/api/screener/filter", self.base_url))
            .json(&ScreenerRequest { filters })
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        response.json().context("decode screener results")
    }

    pub fn stock_details(&self, isin: &Isin) -> Result<StockDetails> {
        self.get_json(
            &format!("/api/stock/{}/details", isin.as_str()),
            "decode stock details",
        )
    }

    pub fn stock_info(&self, isin: &Isin) -> Result<StockInfo> {
        self.get_json(
            &format!("/api/stock/{}/info", isin.as_str()),
            "decode stock info",
        )
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, decode: &str) -> Result<T> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        response.json().with_context(|| decode.to_owned())
    }

    fn post_ok<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        Ok(())
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!("cannot reach {base_url} -- is the stock service running? ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), error);
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Serialize)]
struct FavoritePayload<'a> {
    isin: &'a str,
    favorite: u8,
}

#[derive(Debug, Serialize)]
struct NotePayload<'a> {
    isin: &'a str,
    notes: &'a str,
}

#[derive(Debug, Serialize)]
struct ColumnsPayload<'a> {
    columns: &'a [ColumnUpdate],
}

#[derive(Debug, Serialize)]
struct ScreenerRequest<'a> {
    filters: &'a FilterSet,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{Client, ScreenerRequest, clean_error_response};
    use aktien_app::{CompareOp, FilterSet, NumericFilter};
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn client_rejects_empty_and_malformed_base_urls() {
        assert!(Client::new("", Duration::from_secs(1)).is_err());
        assert!(Client::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn client_trims_trailing_slashes() {
        let client =
            Client::new("http://localhost:5000///", Duration::from_secs(1)).expect("client");
        assert_eq!(client.base_url(), "http://localhost:5000");
    }

    #[test]
    fn screener_request_wraps_filters() {
        let filters = FilterSet {
            search: "sap".to_owned(),
            numeric: vec![NumericFilter {
                column: "ttm_pe".to_owned(),
                operator: CompareOp::Lt,
                value: 20.0,
            }],
            ..FilterSet::default()
        };
        let encoded =
            serde_json::to_string(&ScreenerRequest { filters: &filters }).expect("encode");
        assert!(encoded.starts_with(r#"{"filters":"#));
        assert!(encoded.contains(r#""operator":"<""#));
    }

    #[test]
    fn error_envelope_is_surfaced() {
        let error = clean_error_response(
            StatusCode::NOT_FOUND,
            r#"{"error":"Aktie nicht gefunden"}"#,
        );
        let message = error.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("Aktie nicht gefunden"));
    }

    #[test]
    fn short_plain_bodies_are_quoted_and_long_ones_elided() {
        let short = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(short.to_string().contains("upstream down"));

        let html = "<html>".repeat(50);
        let long = clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, &html);
        assert_eq!(long.to_string(), "server returned 500");
    }
}
