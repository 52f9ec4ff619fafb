// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::ids::Isin;
use crate::model::{DetailTab, StockDetails, ViewKind};
use crate::sort::{SortSpec, cycle_sort};

/// The stock-detail drill-down as an explicit state machine. Every fetch
/// carries a monotonically increasing request id; a response whose id does
/// not match the in-flight id is stale and gets dropped, so a slow earlier
/// fetch can never overwrite a newer one.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Idle,
    Loading {
        isin: Isin,
        tab: DetailTab,
        request_id: u64,
    },
    Ready {
        isin: Isin,
        tab: DetailTab,
        details: Box<StockDetails>,
    },
    Failed {
        message: String,
    },
}

impl DetailState {
    pub fn isin(&self) -> Option<&Isin> {
        match self {
            Self::Loading { isin, .. } | Self::Ready { isin, .. } => Some(isin),
            Self::Idle | Self::Failed { .. } => None,
        }
    }

    pub fn active_tab(&self) -> Option<DetailTab> {
        match self {
            Self::Loading { tab, .. } | Self::Ready { tab, .. } => Some(*tab),
            Self::Idle | Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub view: ViewKind,
    pub sort: Option<SortSpec>,
    pub detail: DetailState,
    pub status_line: Option<String>,
    next_request_id: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            view: ViewKind::Watchlist,
            sort: None,
            detail: DetailState::Idle,
            status_line: None,
            next_request_id: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    SwitchView(ViewKind),
    CycleSort(String),
    ClearSort,
    OpenDetail { isin: Isin, tab: DetailTab },
    SwitchDetailTab(DetailTab),
    DetailLoaded {
        request_id: u64,
        details: Box<StockDetails>,
    },
    DetailFailed {
        request_id: u64,
        message: String,
    },
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    ViewChanged(ViewKind),
    SortChanged(Option<SortSpec>),
    DetailFetchRequested { isin: Isin, request_id: u64 },
    DetailReady(Isin),
    DetailTabChanged(DetailTab),
    DetailFetchFailed(String),
    StaleDetailResponseDropped { request_id: u64 },
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::SwitchView(view) => {
                if self.view == view {
                    return Vec::new();
                }
                self.view = view;
                self.sort = None;
                vec![
                    AppEvent::ViewChanged(view),
                    AppEvent::SortChanged(None),
                    self.set_status(view.label()),
                ]
            }
            AppCommand::CycleSort(column) => {
                let next = cycle_sort(self.sort.as_ref(), &column);
                let message = format!(
                    "sort {column} {}",
                    match next.direction {
                        crate::model::SortDirection::Asc => "asc",
                        crate::model::SortDirection::Desc => "desc",
                    }
                );
                self.sort = Some(next.clone());
                vec![AppEvent::SortChanged(Some(next)), self.set_status(message)]
            }
            AppCommand::ClearSort => {
                if self.sort.is_none() {
                    return Vec::new();
                }
                self.sort = None;
                vec![
                    AppEvent::SortChanged(None),
                    self.set_status("sort cleared"),
                ]
            }
            AppCommand::OpenDetail { isin, tab } => {
                // Every open fetches fresh, even for the company already cached.
                let request_id = self.next_request_id();
                self.detail = DetailState::Loading {
                    isin: isin.clone(),
                    tab,
                    request_id,
                };
                vec![AppEvent::DetailFetchRequested { isin, request_id }]
            }
            AppCommand::SwitchDetailTab(tab) => match &mut self.detail {
                // Pure re-render from the cached payload; no fetch.
                DetailState::Ready { tab: active, .. } if *active != tab => {
                    *active = tab;
                    vec![AppEvent::DetailTabChanged(tab)]
                }
                _ => Vec::new(),
            },
            AppCommand::DetailLoaded {
                request_id,
                details,
            } => match &self.detail {
                DetailState::Loading {
                    isin,
                    tab,
                    request_id: in_flight,
                } if *in_flight == request_id => {
                    let isin = isin.clone();
                    self.detail = DetailState::Ready {
                        isin: isin.clone(),
                        tab: *tab,
                        details,
                    };
                    vec![AppEvent::DetailReady(isin)]
                }
                _ => vec![AppEvent::StaleDetailResponseDropped { request_id }],
            },
            AppCommand::DetailFailed {
                request_id,
                message,
            } => match &self.detail {
                DetailState::Loading {
                    request_id: in_flight,
                    ..
                } if *in_flight == request_id => {
                    self.detail = DetailState::Failed {
                        message: message.clone(),
                    };
                    vec![
                        AppEvent::DetailFetchFailed(message.clone()),
                        self.set_status(format!("detail load failed: {message}")),
                    ]
                }
                _ => vec![AppEvent::StaleDetailResponseDropped { request_id }],
            },
            AppCommand::SetStatus(message) => {
                vec![self.set_status(message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn next_request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }

    fn set_status(&mut self, message: impl Into<String>) -> AppEvent {
        let message = message.into();
        self.status_line = Some(message.clone());
        AppEvent::StatusUpdated(message)
    }
}
