// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use std::sync::mpsc::Sender;
use std::thread;

use aktien_api::Client;
use aktien_app::{
    ColumnConfig, ColumnUpdate, FavoriteRank, FavoriteSettings, FilterOptions, FilterSet, Isin,
    ScreenerPage, StockDetails, StockInfo, ViewKind,
};
use aktien_store::Store;
use aktien_tui::{AppRuntime, InternalEvent};

/// Wires the REST client and the local filter store into the UI. The
/// watchlist shares the screener's row endpoint; rank filtering and ordering
/// happen in the view layer.
pub struct ApiRuntime {
    client: Client,
    store: Store,
}

impl ApiRuntime {
    pub fn new(client: Client, store: Store) -> Self {
        Self { client, store }
    }
}

impl AppRuntime for ApiRuntime {
    fn load_view(&mut self, _view: ViewKind) -> Result<ScreenerPage> {
        self.client.run_screener(&FilterSet::default())
    }

    fn apply_screener_filters(&mut self, filters: &FilterSet) -> Result<ScreenerPage> {
        self.client.run_screener(filters)
    }

    fn load_filter_options(&mut self) -> Result<FilterOptions> {
        self.client.filter_options()
    }

    fn load_saved_filters(&mut self, view: ViewKind) -> Result<Option<FilterSet>> {
        self.store.load_filters(view)
    }

    fn persist_filters(&mut self, view: ViewKind, filters: &FilterSet) -> Result<()> {
        self.store.save_filters(view, filters)
    }

    fn clear_saved_filters(&mut self, view: ViewKind) -> Result<()> {
        self.store.clear_filters(view)
    }

    fn set_favorite(&mut self, isin: &Isin, favorite: FavoriteRank) -> Result<()> {
        self.client.set_favorite(isin, favorite)
    }

    fn set_note(&mut self, isin: &Isin, notes: &str) -> Result<()> {
        self.client.set_note(isin, notes)
    }

    fn load_favorite_settings(&mut self) -> Result<FavoriteSettings> {
        self.client.favorite_settings()
    }

    fn save_favorite_settings(&mut self, settings: &FavoriteSettings) -> Result<()> {
        self.client.save_favorite_settings(settings)
    }

    fn load_columns(&mut self, view: ViewKind) -> Result<ColumnConfig> {
        self.client.columns(view)
    }

    fn save_columns(&mut self, view: ViewKind, updates: &[ColumnUpdate]) -> Result<()> {
        self.client.save_columns(view, updates)
    }

    fn fetch_stock_details(&mut self, isin: &Isin) -> Result<StockDetails> {
        self.client.stock_details(isin)
    }

    fn load_stock_info(&mut self, isin: &Isin) -> Result<StockInfo> {
        self.client.stock_info(isin)
    }

    /// Runs the fetch on its own thread so the event loop keeps rendering.
    /// The result arrives tagged with the request id; the UI drops anything
    /// that is no longer in flight.
    fn spawn_detail_fetch(
        &mut self,
        request_id: u64,
        isin: &Isin,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        let isin = isin.clone();
        thread::spawn(move || {
            let result = match client.stock_details(&isin) {
                Ok(details) => Ok(Box::new(details)),
                Err(error) => Err(format!("{error:#}")),
            };
            let _ = tx.send(InternalEvent::DetailFetched { request_id, result });
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ApiRuntime;
    use aktien_api::Client;
    use aktien_app::{CompareOp, FilterSet, Isin, NumericFilter, ViewKind};
    use aktien_testkit::{memory_store, sample_details_json, sample_screener_page_json};
    use aktien_tui::{AppRuntime, InternalEvent};
    use anyhow::{Result, anyhow};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tiny_http::{Header, Response, Server};

    fn mock_server(body: String, expected_url: &'static str) -> Result<(String, thread::JoinHandle<()>)> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let addr = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let request = server.recv().expect("request expected");
            assert_eq!(request.url(), expected_url);
            let response = Response::from_string(body).with_status_code(200).with_header(
                Header::from_bytes("Content-Type", "application/json")
                    .expect("valid content type header"),
            );
            request.respond(response).expect("respond");
        });
        Ok((addr, handle))
    }

    #[test]
    fn load_view_fetches_the_unfiltered_universe() -> Result<()> {
        let (addr, handle) = mock_server(sample_screener_page_json(), "/api/screener/filter")?;
        let client = Client::new(&addr, Duration::from_secs(1))?;
        let mut runtime = ApiRuntime::new(client, memory_store()?);

        let page = runtime.load_view(ViewKind::Watchlist)?;
        assert_eq!(page.stocks.len(), 3);

        handle.join().expect("server thread should join");
        Ok(())
    }

    #[test]
    fn filter_persistence_round_trips_through_the_store() -> Result<()> {
        let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))?;
        let mut runtime = ApiRuntime::new(client, memory_store()?);

        let filters = FilterSet {
            search: "sap".to_owned(),
            numeric: vec![NumericFilter {
                column: "ttm_pe".to_owned(),
                operator: CompareOp::Lt,
                value: 20.0,
            }],
            ..FilterSet::default()
        };
        runtime.persist_filters(ViewKind::Screener, &filters)?;
        assert_eq!(
            runtime.load_saved_filters(ViewKind::Screener)?,
            Some(filters)
        );

        runtime.clear_saved_filters(ViewKind::Screener)?;
        assert_eq!(runtime.load_saved_filters(ViewKind::Screener)?, None);
        Ok(())
    }

    #[test]
    fn spawned_detail_fetch_delivers_a_tagged_event() -> Result<()> {
        let (addr, handle) = mock_server(sample_details_json(), "/api/stock/DE0007164600/details")?;
        let client = Client::new(&addr, Duration::from_secs(1))?;
        let mut runtime = ApiRuntime::new(client, memory_store()?);

        let (tx, rx) = mpsc::channel();
        runtime.spawn_detail_fetch(7, &Isin::new("DE0007164600"), tx)?;

        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("detail event expected");
        match event {
            InternalEvent::DetailFetched { request_id, result } => {
                assert_eq!(request_id, 7);
                let details = result.expect("fetch should succeed");
                assert_eq!(details.company.name.as_deref(), Some("SAP SE"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        handle.join().expect("server thread should join");
        Ok(())
    }

    #[test]
    fn spawned_detail_fetch_reports_failures_as_strings() -> Result<()> {
        let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))?;
        let mut runtime = ApiRuntime::new(client, memory_store()?);

        let (tx, rx) = mpsc::channel();
        runtime.spawn_detail_fetch(8, &Isin::new("DE0007164600"), tx)?;

        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("detail event expected");
        match event {
            InternalEvent::DetailFetched { request_id, result } => {
                assert_eq!(request_id, 8);
                let message = result.expect_err("fetch should fail");
                assert!(message.contains("cannot reach"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        Ok(())
    }
}
