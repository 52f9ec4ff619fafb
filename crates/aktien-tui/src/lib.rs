// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::widgets::{
    Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row, Table, Tabs,
    Wrap,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use aktien_app::{
    AppCommand, AppEvent, AppState, CATEGORICAL_FIELDS, CategoricalSelection, CellValue,
    ColumnConfig, ColumnDescriptor, ColumnFormat, ColumnUpdate, DetailState, DetailTab,
    EvCalculation, EvEbitOverview, FavoriteRank, FavoriteSettings, FilterOptions, FilterSet,
    FiscalYear, Isin, NumericFilterRow, PeOverview, ScreenerPage, SortDirection, SortSpec,
    StockDetails, StockInfo, StockRow, Tone, TtmCalculation, ViewKind, build_column_updates,
    compose_filters, flat_display_order, fold_german, grouped_columns, growth_rows, margin_rows,
    rows_from_filters, sort_rows,
};

const HALF_PAGE_ROWS: isize = 10;
const FULL_PAGE_ROWS: isize = 20;
const STATUS_CLEAR_SECS: u64 = 4;
const NOTE_MARK: &str = "≡";
const NOTE_EMPTY_MARK: &str = "+";

/// The seam between the UI and the outside world: the binary wires this to
/// the REST client and the local filter store.
pub trait AppRuntime {
    fn load_view(&mut self, view: ViewKind) -> Result<ScreenerPage>;
    fn apply_screener_filters(&mut self, filters: &FilterSet) -> Result<ScreenerPage>;
    fn load_filter_options(&mut self) -> Result<FilterOptions>;
    fn load_saved_filters(&mut self, view: ViewKind) -> Result<Option<FilterSet>>;
    fn persist_filters(&mut self, view: ViewKind, filters: &FilterSet) -> Result<()>;
    fn clear_saved_filters(&mut self, view: ViewKind) -> Result<()>;
    fn set_favorite(&mut self, isin: &Isin, favorite: FavoriteRank) -> Result<()>;
    fn set_note(&mut self, isin: &Isin, notes: &str) -> Result<()>;
    fn load_favorite_settings(&mut self) -> Result<FavoriteSettings>;
    fn save_favorite_settings(&mut self, settings: &FavoriteSettings) -> Result<()>;
    fn load_columns(&mut self, view: ViewKind) -> Result<ColumnConfig>;
    fn save_columns(&mut self, view: ViewKind, updates: &[ColumnUpdate]) -> Result<()>;
    fn fetch_stock_details(&mut self, isin: &Isin) -> Result<StockDetails>;
    fn load_stock_info(&mut self, isin: &Isin) -> Result<StockInfo>;

    /// Kicks off a detail fetch and delivers the tagged result over the
    /// internal channel. The default runs inline; runtimes with a real
    /// network move this onto a thread so the UI keeps polling.
    fn spawn_detail_fetch(
        &mut self,
        request_id: u64,
        isin: &Isin,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let result = match self.fetch_stock_details(isin) {
            Ok(details) => Ok(Box::new(details)),
            Err(error) => Err(format!("{error:#}")),
        };
        tx.send(InternalEvent::DetailFetched { request_id, result })
            .map_err(|_| anyhow::anyhow!("detail event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    DetailFetched {
        request_id: u64,
        result: Result<Box<StockDetails>, String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
struct SearchUiState {
    active: bool,
    input: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct NoteUiState {
    visible: bool,
    isin: Option<Isin>,
    text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct InfoUiState {
    visible: bool,
    info: Option<StockInfo>,
    error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct FavoritesUiState {
    visible: bool,
    settings: FavoriteSettings,
    cursor: usize,
    editing: bool,
    buffer: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ColumnsPanel {
    #[default]
    Toggle,
    Order,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ColumnsUiState {
    visible: bool,
    all: Vec<ColumnDescriptor>,
    groups: Vec<(String, Vec<ColumnDescriptor>)>,
    order: Vec<String>,
    panel: ColumnsPanel,
    toggle_cursor: usize,
    order_cursor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterEntry {
    Categorical(usize),
    Numeric(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct FilterUiState {
    visible: bool,
    options: Option<FilterOptions>,
    categorical: CategoricalSelection,
    rows: Vec<NumericFilterRow>,
    cursor: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ViewData {
    page: Option<ScreenerPage>,
    favorite_settings: FavoriteSettings,
    selected_row: usize,
    selected_col: usize,
    search: SearchUiState,
    note: NoteUiState,
    info: InfoUiState,
    favorites: FavoritesUiState,
    columns: ColumnsUiState,
    filter: FilterUiState,
    detail_visible: bool,
    help_visible: bool,
    status_token: u64,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_view(state, runtime, &mut view_data) {
        state.dispatch(AppCommand::SetStatus(format!("load failed: {error:#}")));
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::DetailFetched { request_id, result } => {
                let command = match result {
                    Ok(details) => AppCommand::DetailLoaded {
                        request_id,
                        details,
                    },
                    Err(message) => AppCommand::DetailFailed {
                        request_id,
                        message,
                    },
                };
                // Stale responses fall out here: the state machine compares
                // request ids and drops anything that is not in flight.
                state.dispatch(command);
            }
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(STATUS_CLEAR_SECS));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn dispatch_and_spawn<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    for event in state.dispatch(command) {
        if let AppEvent::DetailFetchRequested { isin, request_id } = event
            && let Err(error) = runtime.spawn_detail_fetch(request_id, &isin, tx.clone())
        {
            let _ = tx.send(InternalEvent::DetailFetched {
                request_id,
                result: Err(format!("{error:#}")),
            });
        }
    }
}

fn refresh_view<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    match runtime.load_favorite_settings() {
        Ok(settings) => view_data.favorite_settings = settings,
        Err(error) => {
            state.dispatch(AppCommand::SetStatus(format!(
                "favorite settings unavailable: {error:#}"
            )));
        }
    }

    view_data.page = Some(match state.view {
        ViewKind::Watchlist => runtime.load_view(ViewKind::Watchlist)?,
        ViewKind::Screener => match runtime.load_saved_filters(ViewKind::Screener) {
            // A persisted filter set is restored and re-applied on load.
            Ok(Some(saved)) => {
                view_data.search.input = saved.search.clone();
                view_data.filter.categorical = CategoricalSelection::from_filters(&saved);
                view_data.filter.rows = rows_from_filters(&saved);
                runtime.apply_screener_filters(&saved)?
            }
            Ok(None) => runtime.load_view(ViewKind::Screener)?,
            Err(error) => {
                state.dispatch(AppCommand::SetStatus(format!(
                    "saved filters unreadable, starting empty: {error:#}"
                )));
                runtime.load_view(ViewKind::Screener)?
            }
        },
    });

    clamp_cursor(state, view_data);
    Ok(())
}

fn clamp_cursor(state: &AppState, view_data: &mut ViewData) {
    let Some(page) = &view_data.page else {
        view_data.selected_row = 0;
        view_data.selected_col = 0;
        return;
    };
    let row_count = visible_rows(page, state.view, &view_data.favorite_settings, state.sort.as_ref())
        .len();
    if row_count == 0 {
        view_data.selected_row = 0;
    } else if view_data.selected_row >= row_count {
        view_data.selected_row = row_count - 1;
    }
    let column_count = table_column_count(page);
    if view_data.selected_col >= column_count {
        view_data.selected_col = column_count.saturating_sub(1);
    }
}

/// The rows the table actually shows: the watchlist keeps only visible
/// favorite ranks and defaults to rank-then-name order; an explicit sort
/// wins on both views.
fn visible_rows(
    page: &ScreenerPage,
    view: ViewKind,
    settings: &FavoriteSettings,
    sort: Option<&SortSpec>,
) -> Vec<StockRow> {
    let mut rows = page.stocks.clone();
    if view == ViewKind::Watchlist {
        rows.retain(|row| row.favorite.is_ranked() && settings.is_visible(row.favorite.get()));
    }
    match sort {
        Some(spec) => sort_rows(&mut rows, spec),
        None if view == ViewKind::Watchlist => rows.sort_by(|left, right| {
            left.favorite.cmp(&right.favorite).then_with(|| {
                fold_german(left.company_name()).cmp(&fold_german(right.company_name()))
            })
        }),
        None => {}
    }
    rows
}

fn table_column_count(page: &ScreenerPage) -> usize {
    // Fav + configured columns + Notizen.
    page.columns.len() + 2
}

fn column_key_at(page: &ScreenerPage, index: usize) -> Option<String> {
    if index == 0 {
        return Some("favorite".to_owned());
    }
    if let Some(column) = page.columns.get(index - 1) {
        return Some(column.column_key.clone());
    }
    if index == page.columns.len() + 1 {
        return Some("notes".to_owned());
    }
    None
}

/// Which detail tab a metric column drills into. Mirrors the column families
/// of the screener: P/E columns open the KGV tab, EV/EBIT columns the
/// EV/EBIT tab, CAGR columns the growth tab, margin columns the margins tab.
fn detail_tab_for_column(key: &str) -> Option<DetailTab> {
    if key.contains("ev_ebit") {
        return Some(DetailTab::EvEbit);
    }
    if key.contains("margin") {
        return Some(DetailTab::Margins);
    }
    if key.contains("cagr") {
        return Some(DetailTab::Growth);
    }
    if key.starts_with("ttm_pe")
        || key.starts_with("fy_pe")
        || key.starts_with("pe_avg")
        || key.starts_with("yf_ttm_pe")
        || key.starts_with("yf_fwd_pe")
        || key.starts_with("yf_forward_pe")
    {
        return Some(DetailTab::Pe);
    }
    None
}

fn selected_stock(state: &AppState, view_data: &ViewData) -> Option<StockRow> {
    let page = view_data.page.as_ref()?;
    visible_rows(page, state.view, &view_data.favorite_settings, state.sort.as_ref())
        .into_iter()
        .nth(view_data.selected_row)
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        view_data.help_visible = false;
        return false;
    }
    if view_data.note.visible {
        handle_note_key(state, runtime, view_data, internal_tx, key);
        return false;
    }
    if view_data.info.visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter) {
            view_data.info = InfoUiState::default();
        }
        return false;
    }
    if view_data.favorites.visible {
        handle_favorites_key(state, runtime, view_data, internal_tx, key);
        return false;
    }
    if view_data.columns.visible {
        handle_columns_key(state, runtime, view_data, internal_tx, key);
        return false;
    }
    if view_data.filter.visible {
        handle_filter_key(state, runtime, view_data, internal_tx, key);
        return false;
    }
    if view_data.detail_visible {
        handle_detail_key(state, view_data, key);
        return false;
    }
    if view_data.search.active {
        handle_search_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    handle_table_key(state, runtime, view_data, internal_tx, key)
}

fn handle_table_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Tab | KeyCode::BackTab => {
            let next = match state.view {
                ViewKind::Watchlist => ViewKind::Screener,
                ViewKind::Screener => ViewKind::Watchlist,
            };
            state.dispatch(AppCommand::SwitchView(next));
            if let Err(error) = refresh_view(state, runtime, view_data) {
                emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
            }
        }
        KeyCode::Up | KeyCode::Char('k') => move_row(state, view_data, -1),
        KeyCode::Down | KeyCode::Char('j') => move_row(state, view_data, 1),
        KeyCode::Left | KeyCode::Char('h') => move_col(view_data, -1),
        KeyCode::Right | KeyCode::Char('l') => move_col(view_data, 1),
        KeyCode::PageUp => move_row(state, view_data, -FULL_PAGE_ROWS),
        KeyCode::PageDown => move_row(state, view_data, FULL_PAGE_ROWS),
        KeyCode::Char('u') => move_row(state, view_data, -HALF_PAGE_ROWS),
        KeyCode::Char('d') => move_row(state, view_data, HALF_PAGE_ROWS),
        KeyCode::Home | KeyCode::Char('g') => view_data.selected_row = 0,
        KeyCode::End | KeyCode::Char('G') => move_row(state, view_data, isize::MAX / 2),
        KeyCode::Char('s') => {
            if let Some(page) = &view_data.page
                && let Some(column) = column_key_at(page, view_data.selected_col)
            {
                state.dispatch(AppCommand::CycleSort(column));
                clamp_cursor(state, view_data);
            }
        }
        KeyCode::Char('S') => {
            state.dispatch(AppCommand::ClearSort);
        }
        KeyCode::Char('f') => cycle_favorite(state, runtime, view_data, internal_tx),
        KeyCode::Char('n') => open_note(state, view_data),
        KeyCode::Char('i') => open_info(state, runtime, view_data, internal_tx),
        KeyCode::Char('V') => open_favorites(state, runtime, view_data, internal_tx),
        KeyCode::Char('C') => open_columns(state, runtime, view_data, internal_tx),
        KeyCode::Char('F') => open_filter(state, runtime, view_data, internal_tx),
        KeyCode::Char('/') => {
            if state.view == ViewKind::Screener {
                view_data.search.active = true;
            } else {
                emit_status(state, view_data, internal_tx, "search only on screener");
            }
        }
        KeyCode::Char('R') => {
            if let Err(error) = refresh_view(state, runtime, view_data) {
                emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
            } else {
                emit_status(state, view_data, internal_tx, "reloaded");
            }
        }
        KeyCode::Enter => open_drilldown(state, runtime, view_data, internal_tx),
        _ => {}
    }
    false
}

fn move_row(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let Some(page) = &view_data.page else { return };
    let row_count = visible_rows(page, state.view, &view_data.favorite_settings, state.sort.as_ref())
        .len();
    if row_count == 0 {
        view_data.selected_row = 0;
        return;
    }
    let current = view_data.selected_row as isize;
    let next = (current + delta).clamp(0, row_count as isize - 1);
    view_data.selected_row = next as usize;
}

fn move_col(view_data: &mut ViewData, delta: isize) {
    let Some(page) = &view_data.page else { return };
    let column_count = table_column_count(page) as isize;
    if column_count == 0 {
        return;
    }
    let next = (view_data.selected_col as isize + delta).clamp(0, column_count - 1);
    view_data.selected_col = next as usize;
}

fn cycle_favorite<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(row) = selected_stock(state, view_data) else {
        return;
    };
    let next = row.favorite.cycled();
    match runtime.set_favorite(&row.isin, next) {
        Ok(()) => {
            if let Some(page) = &mut view_data.page
                && let Some(stored) = page.stocks.iter_mut().find(|stock| stock.isin == row.isin)
            {
                stored.favorite = next;
            }
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("favorite {} -> {}", row.isin, next),
            );
        }
        Err(error) => {
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("favorite save failed: {error:#}"),
            );
        }
    }
}

fn open_note(state: &AppState, view_data: &mut ViewData) {
    if let Some(row) = selected_stock(state, view_data) {
        view_data.note = NoteUiState {
            visible: true,
            isin: Some(row.isin.clone()),
            text: row.notes.clone(),
        };
    }
}

fn handle_note_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => view_data.note = NoteUiState::default(),
        KeyCode::Enter => {
            let Some(isin) = view_data.note.isin.clone() else {
                view_data.note = NoteUiState::default();
                return;
            };
            let text = view_data.note.text.clone();
            match runtime.set_note(&isin, &text) {
                Ok(()) => {
                    if let Some(page) = &mut view_data.page
                        && let Some(stored) =
                            page.stocks.iter_mut().find(|stock| stock.isin == isin)
                    {
                        stored.notes = text;
                    }
                    view_data.note = NoteUiState::default();
                    emit_status(state, view_data, internal_tx, "note saved");
                }
                Err(error) => {
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("note save failed: {error:#}"),
                    );
                }
            }
        }
        KeyCode::Backspace => {
            view_data.note.text.pop();
        }
        KeyCode::Char(ch) => view_data.note.text.push(ch),
        _ => {}
    }
}

fn open_info<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(row) = selected_stock(state, view_data) else {
        return;
    };
    match runtime.load_stock_info(&row.isin) {
        Ok(info) => {
            view_data.info = InfoUiState {
                visible: true,
                info: Some(info),
                error: None,
            };
        }
        Err(error) => {
            view_data.info = InfoUiState {
                visible: true,
                info: None,
                error: Some(format!("{error:#}")),
            };
            emit_status(state, view_data, internal_tx, "company info load failed");
        }
    }
}

fn open_favorites<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match runtime.load_favorite_settings() {
        Ok(settings) => {
            view_data.favorites = FavoritesUiState {
                visible: true,
                settings,
                cursor: 0,
                editing: false,
                buffer: String::new(),
            };
        }
        Err(error) => {
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("favorite settings load failed: {error:#}"),
            );
        }
    }
}

fn handle_favorites_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if view_data.favorites.editing {
        match key.code {
            KeyCode::Esc => {
                view_data.favorites.editing = false;
                view_data.favorites.buffer.clear();
            }
            KeyCode::Enter => {
                let rank = (view_data.favorites.cursor + 1) as u8;
                let label = view_data.favorites.buffer.clone();
                view_data.favorites.settings.set_label(rank, label);
                view_data.favorites.editing = false;
                view_data.favorites.buffer.clear();
            }
            KeyCode::Backspace => {
                view_data.favorites.buffer.pop();
            }
            KeyCode::Char(ch) => view_data.favorites.buffer.push(ch),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => view_data.favorites = FavoritesUiState::default(),
        KeyCode::Up | KeyCode::Char('k') => {
            view_data.favorites.cursor = view_data.favorites.cursor.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            view_data.favorites.cursor = (view_data.favorites.cursor + 1)
                .min(FavoriteRank::RANKED.len() - 1);
        }
        KeyCode::Char(' ') => {
            let rank = (view_data.favorites.cursor + 1) as u8;
            view_data.favorites.settings.toggle_visible(rank);
        }
        KeyCode::Char('e') => {
            let rank = (view_data.favorites.cursor + 1) as u8;
            view_data.favorites.buffer = view_data.favorites.settings.label(rank);
            view_data.favorites.editing = true;
        }
        KeyCode::Enter => {
            let settings = view_data.favorites.settings.clone();
            match runtime.save_favorite_settings(&settings) {
                Ok(()) => {
                    view_data.favorites = FavoritesUiState::default();
                    view_data.favorite_settings = settings;
                    // The original reloads the whole page after saving.
                    if let Err(error) = refresh_view(state, runtime, view_data) {
                        emit_status(
                            state,
                            view_data,
                            internal_tx,
                            format!("load failed: {error:#}"),
                        );
                    } else {
                        emit_status(state, view_data, internal_tx, "favorite settings saved");
                    }
                }
                Err(error) => {
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("favorite settings save failed: {error:#}"),
                    );
                }
            }
        }
        _ => {}
    }
}

fn open_columns<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match runtime.load_columns(state.view) {
        Ok(config) => {
            let groups = grouped_columns(&config.groups);
            let all = flat_display_order(&config.groups);
            let mut visible: Vec<&ColumnDescriptor> = config
                .columns
                .iter()
                .filter(|column| column.is_visible)
                .collect();
            visible.sort_by_key(|column| column.sort_order);
            view_data.columns = ColumnsUiState {
                visible: true,
                all,
                groups,
                order: visible
                    .into_iter()
                    .map(|column| column.column_key.clone())
                    .collect(),
                panel: ColumnsPanel::Toggle,
                toggle_cursor: 0,
                order_cursor: 0,
            };
        }
        Err(error) => {
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("columns load failed: {error:#}"),
            );
        }
    }
}

fn toggle_column(columns: &mut ColumnsUiState) {
    let Some(column) = columns.all.get(columns.toggle_cursor) else {
        return;
    };
    let key = column.column_key.clone();
    if let Some(position) = columns.order.iter().position(|entry| *entry == key) {
        columns.order.remove(position);
        if columns.order_cursor >= columns.order.len() && columns.order_cursor > 0 {
            columns.order_cursor -= 1;
        }
    } else {
        // Checking a column appends it to the end of the order list.
        columns.order.push(key);
    }
}

fn move_order_entry(columns: &mut ColumnsUiState, delta: isize) {
    if columns.order.is_empty() {
        return;
    }
    let current = columns.order_cursor as isize;
    let target = current + delta;
    if target < 0 || target >= columns.order.len() as isize {
        return;
    }
    columns.order.swap(current as usize, target as usize);
    columns.order_cursor = target as usize;
}

fn handle_columns_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => view_data.columns = ColumnsUiState::default(),
        KeyCode::Tab | KeyCode::BackTab => {
            view_data.columns.panel = match view_data.columns.panel {
                ColumnsPanel::Toggle => ColumnsPanel::Order,
                ColumnsPanel::Order => ColumnsPanel::Toggle,
            };
        }
        KeyCode::Up | KeyCode::Char('k') => match view_data.columns.panel {
            ColumnsPanel::Toggle => {
                view_data.columns.toggle_cursor =
                    view_data.columns.toggle_cursor.saturating_sub(1);
            }
            ColumnsPanel::Order => {
                view_data.columns.order_cursor = view_data.columns.order_cursor.saturating_sub(1);
            }
        },
        KeyCode::Down | KeyCode::Char('j') => match view_data.columns.panel {
            ColumnsPanel::Toggle => {
                let max = view_data.columns.all.len().saturating_sub(1);
                view_data.columns.toggle_cursor = (view_data.columns.toggle_cursor + 1).min(max);
            }
            ColumnsPanel::Order => {
                let max = view_data.columns.order.len().saturating_sub(1);
                view_data.columns.order_cursor = (view_data.columns.order_cursor + 1).min(max);
            }
        },
        KeyCode::Char(' ') => {
            if view_data.columns.panel == ColumnsPanel::Toggle {
                toggle_column(&mut view_data.columns);
            }
        }
        KeyCode::Char('K') => {
            if view_data.columns.panel == ColumnsPanel::Order {
                move_order_entry(&mut view_data.columns, -1);
            }
        }
        KeyCode::Char('J') => {
            if view_data.columns.panel == ColumnsPanel::Order {
                move_order_entry(&mut view_data.columns, 1);
            }
        }
        KeyCode::Enter => {
            let updates = build_column_updates(&view_data.columns.order, &view_data.columns.all);
            match runtime.save_columns(state.view, &updates) {
                Ok(()) => {
                    view_data.columns = ColumnsUiState::default();
                    if let Err(error) = refresh_view(state, runtime, view_data) {
                        emit_status(
                            state,
                            view_data,
                            internal_tx,
                            format!("load failed: {error:#}"),
                        );
                    } else {
                        emit_status(state, view_data, internal_tx, "columns saved");
                    }
                }
                Err(error) => {
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("columns save failed: {error:#}"),
                    );
                }
            }
        }
        _ => {}
    }
}

fn open_filter<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.view != ViewKind::Screener {
        emit_status(state, view_data, internal_tx, "filters only on screener");
        return;
    }
    if view_data.filter.options.is_none() {
        match runtime.load_filter_options() {
            Ok(options) => view_data.filter.options = Some(options),
            Err(error) => {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("filter options load failed: {error:#}"),
                );
                return;
            }
        }
    }
    if view_data.filter.rows.is_empty() {
        view_data.filter.rows.push(NumericFilterRow::blank());
    }
    view_data.filter.visible = true;
    view_data.filter.cursor = 0;
}

fn filter_entries(filter: &FilterUiState) -> Vec<FilterEntry> {
    let mut entries: Vec<FilterEntry> = (0..CATEGORICAL_FIELDS.len())
        .map(FilterEntry::Categorical)
        .collect();
    entries.extend((0..filter.rows.len()).map(FilterEntry::Numeric));
    entries
}

/// All numeric filter columns flattened in the fixed group order, the way
/// the original grouped its option list.
fn numeric_column_options(options: &FilterOptions) -> Vec<ColumnDescriptor> {
    let mut grouped: std::collections::BTreeMap<String, Vec<ColumnDescriptor>> =
        std::collections::BTreeMap::new();
    for column in &options.numeric {
        grouped
            .entry(column.column_group.clone())
            .or_default()
            .push(column.clone());
    }
    flat_display_order(&grouped)
}

fn cycle_option(current: Option<&str>, values: &[String], delta: isize) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    // Positions: None ("Alle"), then each value; cycling wraps around.
    let len = values.len() as isize + 1;
    let position = match current {
        None => 0,
        Some(value) => values
            .iter()
            .position(|candidate| candidate == value)
            .map(|index| index as isize + 1)
            .unwrap_or(0),
    };
    let next = (position + delta).rem_euclid(len);
    if next == 0 {
        None
    } else {
        Some(values[(next - 1) as usize].clone())
    }
}

fn cycle_numeric_column(filter: &mut FilterUiState, row_index: usize) {
    let Some(options) = &filter.options else { return };
    let columns = numeric_column_options(options);
    if columns.is_empty() {
        return;
    }
    let Some(row) = filter.rows.get_mut(row_index) else {
        return;
    };
    let position = columns
        .iter()
        .position(|column| column.column_key == row.column);
    let next = match position {
        None => 0,
        Some(index) => (index + 1) % columns.len(),
    };
    row.column = columns[next].column_key.clone();
}

fn handle_filter_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let entries = filter_entries(&view_data.filter);
    let entry = entries.get(view_data.filter.cursor).copied();

    match key.code {
        KeyCode::Esc => view_data.filter.visible = false,
        KeyCode::Up | KeyCode::Char('k') => {
            view_data.filter.cursor = view_data.filter.cursor.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            view_data.filter.cursor = (view_data.filter.cursor + 1).min(entries.len() - 1);
        }
        KeyCode::Left | KeyCode::Right => {
            if let Some(FilterEntry::Categorical(field_index)) = entry
                && let Some(options) = &view_data.filter.options
            {
                let (field, _) = CATEGORICAL_FIELDS[field_index];
                let values = options
                    .categorical
                    .get(field)
                    .cloned()
                    .unwrap_or_default();
                let delta = if key.code == KeyCode::Left { -1 } else { 1 };
                let next = cycle_option(view_data.filter.categorical.get(field), &values, delta);
                view_data.filter.categorical.set(field, next);
            }
        }
        KeyCode::Char('c') => {
            if let Some(FilterEntry::Numeric(row_index)) = entry {
                cycle_numeric_column(&mut view_data.filter, row_index);
            }
        }
        KeyCode::Char('o') => {
            if let Some(FilterEntry::Numeric(row_index)) = entry
                && let Some(row) = view_data.filter.rows.get_mut(row_index)
            {
                row.operator = row.operator.cycled();
            }
        }
        KeyCode::Backspace => {
            if let Some(FilterEntry::Numeric(row_index)) = entry
                && let Some(row) = view_data.filter.rows.get_mut(row_index)
            {
                row.value.pop();
            }
        }
        KeyCode::Char('a') => {
            view_data.filter.rows.push(NumericFilterRow::blank());
        }
        KeyCode::Char('x') => {
            if let Some(FilterEntry::Numeric(row_index)) = entry {
                view_data.filter.rows.remove(row_index);
                if view_data.filter.rows.is_empty() {
                    view_data.filter.rows.push(NumericFilterRow::blank());
                }
                let max = filter_entries(&view_data.filter).len() - 1;
                view_data.filter.cursor = view_data.filter.cursor.min(max);
            }
        }
        KeyCode::Char('r') => reset_filters(state, runtime, view_data, internal_tx),
        KeyCode::Char(ch) if ch.is_ascii_digit() || ch == '.' || ch == '-' => {
            if let Some(FilterEntry::Numeric(row_index)) = entry
                && let Some(row) = view_data.filter.rows.get_mut(row_index)
            {
                row.value.push(ch);
            }
        }
        KeyCode::Enter => apply_filters(state, runtime, view_data, internal_tx),
        _ => {}
    }
}

/// Compose, persist, submit: the merged set becomes the single source of
/// truth, is written to the local store, and the response replaces the
/// table.
fn apply_filters<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let filters = compose_filters(
        &view_data.search.input,
        &view_data.filter.categorical,
        &view_data.filter.rows,
    );

    if let Err(error) = runtime.persist_filters(ViewKind::Screener, &filters) {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("filter persist failed: {error:#}"),
        );
    }

    match runtime.apply_screener_filters(&filters) {
        Ok(page) => {
            let count = page.count;
            view_data.page = Some(page);
            view_data.filter.visible = false;
            view_data.selected_row = 0;
            clamp_cursor(state, view_data);
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("{count} stocks found"),
            );
        }
        Err(error) => {
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("filter failed: {error:#}"),
            );
        }
    }
}

/// Clears everything (search, selects, numeric rows, persisted entry) and
/// re-applies, i.e. fetches unfiltered.
fn reset_filters<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    view_data.search.input.clear();
    view_data.filter.categorical.clear();
    view_data.filter.rows = vec![NumericFilterRow::blank()];
    view_data.filter.cursor = 0;
    if let Err(error) = runtime.clear_saved_filters(ViewKind::Screener) {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("filter clear failed: {error:#}"),
        );
    }
    apply_filters(state, runtime, view_data, internal_tx);
}

fn handle_search_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => view_data.search.active = false,
        KeyCode::Enter => {
            view_data.search.active = false;
            apply_filters(state, runtime, view_data, internal_tx);
        }
        KeyCode::Backspace => {
            view_data.search.input.pop();
        }
        KeyCode::Char(ch) => view_data.search.input.push(ch),
        _ => {}
    }
}

fn open_drilldown<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(page) = &view_data.page else { return };
    let Some(column) = column_key_at(page, view_data.selected_col) else {
        return;
    };
    let Some(row) = selected_stock(state, view_data) else {
        return;
    };

    if let Some(tab) = detail_tab_for_column(&column) {
        view_data.detail_visible = true;
        dispatch_and_spawn(
            state,
            runtime,
            internal_tx,
            AppCommand::OpenDetail {
                isin: row.isin.clone(),
                tab,
            },
        );
    } else if column == "company_name" {
        open_info(state, runtime, view_data, internal_tx);
    }
}

fn handle_detail_key(state: &mut AppState, view_data: &mut ViewData, key: KeyEvent) {
    match key.code {
        // Closing hides the overlay; the cached payload stays around.
        KeyCode::Esc | KeyCode::Char('q') => view_data.detail_visible = false,
        KeyCode::Char('1') => {
            state.dispatch(AppCommand::SwitchDetailTab(DetailTab::Pe));
        }
        KeyCode::Char('2') => {
            state.dispatch(AppCommand::SwitchDetailTab(DetailTab::EvEbit));
        }
        KeyCode::Char('3') => {
            state.dispatch(AppCommand::SwitchDetailTab(DetailTab::Growth));
        }
        KeyCode::Char('4') => {
            state.dispatch(AppCommand::SwitchDetailTab(DetailTab::Margins));
        }
        KeyCode::Left | KeyCode::Right => {
            if let Some(active) = state.detail.active_tab() {
                let tabs = DetailTab::ALL;
                let current = tabs
                    .iter()
                    .position(|tab| *tab == active)
                    .unwrap_or(0) as isize;
                let delta: isize = if key.code == KeyCode::Left { -1 } else { 1 };
                let next = (current + delta).rem_euclid(tabs.len() as isize) as usize;
                state.dispatch(AppCommand::SwitchDetailTab(tabs[next]));
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// German number formatting: thousands separated with '.', decimals with ','.
fn format_de(value: f64, decimals: usize) -> String {
    let rendered = format!("{value:.decimals$}");
    let negative = rendered.starts_with('-');
    let unsigned = rendered.trim_start_matches('-');
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(unsigned.len() + 4);
    for (index, digit) in digits.iter().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*digit);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(fraction) = fraction {
        out.push(',');
        out.push_str(fraction);
    }
    out
}

fn format_number(value: Option<f64>) -> String {
    value.map_or("-".to_owned(), |value| format_de(value, 1))
}

fn format_billions(value: Option<f64>) -> String {
    value.map_or("-".to_owned(), |value| {
        format!("{} Mrd", format_de(value / 1e9, 2))
    })
}

fn format_percent(value: Option<f64>) -> String {
    value.map_or("-".to_owned(), |value| format!("{}%", format_de(value, 1)))
}

fn format_signed_percent(value: Option<f64>) -> String {
    value.map_or("-".to_owned(), |value| {
        let sign = if value >= 0.0 { "+" } else { "" };
        format!("{sign}{}%", format_de(value, 1))
    })
}

fn format_cell(value: &CellValue, format: ColumnFormat) -> String {
    match value {
        CellValue::Null => "-".to_owned(),
        CellValue::Text(text) => text.clone(),
        CellValue::Number(number) => match format {
            ColumnFormat::Text => number.to_string(),
            ColumnFormat::Number => format_de(*number, 1),
            ColumnFormat::Percent => format!("{}%", format_de(*number, 1)),
            ColumnFormat::Currency => format_de(*number, 2),
            ColumnFormat::Billions => format_de(*number / 1e9, 1),
        },
    }
}

fn tone_color(tone: Tone) -> Option<Color> {
    match tone {
        Tone::Neutral => None,
        Tone::Positive => Some(Color::Green),
        Tone::Negative => Some(Color::Red),
    }
}

fn favorite_color(rank: FavoriteRank) -> Option<Color> {
    match rank.get() {
        1 => Some(Color::Green),
        2 => Some(Color::Yellow),
        3 => Some(Color::Blue),
        4 => Some(Color::Red),
        5 => Some(Color::Magenta),
        6 => Some(Color::Cyan),
        7 => Some(Color::LightYellow),
        8 => Some(Color::LightGreen),
        9 => Some(Color::Gray),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Detail derivations for rendering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct OverviewRow {
    label: &'static str,
    value: Option<f64>,
    ttm_diff: Option<f64>,
    fwd_diff: Option<f64>,
}

fn pe_overview_rows(pe: &PeOverview) -> Vec<OverviewRow> {
    vec![
        OverviewRow {
            label: "YF TTM-KGV",
            value: pe.yf_ttm_pe,
            ttm_diff: None,
            fwd_diff: None,
        },
        OverviewRow {
            label: "YF Forward-KGV",
            value: pe.yf_forward_pe,
            ttm_diff: None,
            fwd_diff: None,
        },
        OverviewRow {
            label: "Ø 5J",
            value: pe.pe_avg_5y,
            ttm_diff: pe.yf_ttm_pe_vs_avg_5y,
            fwd_diff: pe.yf_fwd_pe_vs_avg_5y,
        },
        OverviewRow {
            label: "Ø 10J",
            value: pe.pe_avg_10y,
            ttm_diff: pe.yf_ttm_pe_vs_avg_10y,
            fwd_diff: pe.yf_fwd_pe_vs_avg_10y,
        },
        OverviewRow {
            label: "Ø 15J",
            value: pe.pe_avg_15y,
            ttm_diff: pe.yf_ttm_pe_vs_avg_15y,
            fwd_diff: pe.yf_fwd_pe_vs_avg_15y,
        },
        OverviewRow {
            label: "Ø 20J",
            value: pe.pe_avg_20y,
            ttm_diff: pe.yf_ttm_pe_vs_avg_20y,
            fwd_diff: pe.yf_fwd_pe_vs_avg_20y,
        },
        OverviewRow {
            label: "Ø 10-19",
            value: pe.pe_avg_10y_2019,
            ttm_diff: pe.yf_ttm_pe_vs_avg_10y_2019,
            fwd_diff: pe.yf_fwd_pe_vs_avg_10y_2019,
        },
    ]
}

fn ev_ebit_overview_rows(ev: &EvEbitOverview) -> Vec<OverviewRow> {
    vec![
        OverviewRow {
            label: "TTM EV/EBIT",
            value: ev.ttm_ev_ebit,
            ttm_diff: None,
            fwd_diff: None,
        },
        OverviewRow {
            label: "FY EV/EBIT",
            value: ev.fy_ev_ebit,
            ttm_diff: None,
            fwd_diff: None,
        },
        OverviewRow {
            label: "Ø 5J",
            value: ev.ev_ebit_avg_5y,
            ttm_diff: ev.ev_ebit_vs_avg_5y,
            fwd_diff: None,
        },
        OverviewRow {
            label: "Ø 10J",
            value: ev.ev_ebit_avg_10y,
            ttm_diff: ev.ev_ebit_vs_avg_10y,
            fwd_diff: None,
        },
        OverviewRow {
            label: "Ø 15J",
            value: ev.ev_ebit_avg_15y,
            ttm_diff: ev.ev_ebit_vs_avg_15y,
            fwd_diff: None,
        },
        OverviewRow {
            label: "Ø 20J",
            value: ev.ev_ebit_avg_20y,
            ttm_diff: ev.ev_ebit_vs_avg_20y,
            fwd_diff: None,
        },
        OverviewRow {
            label: "Ø 10-19",
            value: ev.ev_ebit_avg_10y_2019,
            ttm_diff: ev.ev_ebit_vs_avg_10y_2019,
            fwd_diff: None,
        },
    ]
}

/// Market cap over TTM net income, with the quarter components that add up
/// to the trailing sum.
fn ttm_calc_text(ttm: &TtmCalculation, current_pe: Option<f64>) -> String {
    let mut out = String::new();
    out.push_str(&format!("Market Cap      {}\n", format_billions(ttm.market_cap)));
    out.push_str(&format!(
        "TTM Net Income  {}\n",
        format_billions(ttm.ttm_net_income)
    ));
    out.push_str(&format!("= KGV (TTM)     {}\n", format_number(current_pe)));
    if !ttm.quarters.is_empty() {
        out.push('\n');
        for quarter in &ttm.quarters {
            out.push_str(&format!(
                "{:<9}{}\n",
                quarter.label(),
                format_billions(quarter.net_income)
            ));
        }
        out.push_str(&format!(
            "{:<9}{}\n",
            "Summe",
            format_billions(ttm.ttm_net_income)
        ));
    }
    out
}

fn ev_calc_text(ev: &EvCalculation, current: Option<f64>) -> String {
    let mut out = String::new();
    out.push_str(&format!("Market Cap      {}\n", format_billions(ev.market_cap)));
    out.push_str(&format!("+ Net Debt      {}\n", format_billions(ev.net_debt)));
    out.push_str(&format!(
        "+ Minority Int. {}\n",
        format_billions(ev.minority_interest)
    ));
    out.push_str(&format!(
        "= EV            {}\n",
        format_billions(Some(ev.enterprise_value()))
    ));
    out.push_str(&format!("/ TTM EBIT      {}\n", format_billions(ev.ttm_ebit)));
    out.push_str(&format!("= EV/EBIT       {}\n", format_number(current)));
    if !ev.quarters.is_empty() {
        out.push('\n');
        for quarter in &ev.quarters {
            out.push_str(&format!(
                "{:<9}{}\n",
                quarter.label(),
                format_billions(quarter.operating_income)
            ));
        }
        out.push_str(&format!("{:<9}{}\n", "Summe", format_billions(ev.ttm_ebit)));
    }
    out
}

/// P/E history with a synthetic trailing TTM point when available.
fn pe_chart_inputs(details: &StockDetails) -> (Vec<String>, Vec<Option<f64>>) {
    let mut labels: Vec<String> = details
        .pe_history
        .iter()
        .map(|point| point.year.to_string())
        .collect();
    let mut values: Vec<Option<f64>> =
        details.pe_history.iter().map(|point| point.pe).collect();
    if let Some(ttm) = details.current_ttm_pe {
        labels.push("TTM".to_owned());
        values.push(Some(ttm));
    }
    (labels, values)
}

fn ev_ebit_chart_inputs(details: &StockDetails) -> (Vec<String>, Vec<Option<f64>>) {
    let mut labels: Vec<String> = details
        .ev_ebit_history
        .iter()
        .map(|point| point.year.to_string())
        .collect();
    let mut values: Vec<Option<f64>> = details
        .ev_ebit_history
        .iter()
        .map(|point| point.ev_ebit)
        .collect();
    if let Some(ttm) = details.current_ttm_ev_ebit {
        labels.push("TTM".to_owned());
        values.push(Some(ttm));
    }
    (labels, values)
}

/// Absolute income-statement series in billions for the bar charts; missing
/// years plot as zero, the TTM bar only exists when the metric does.
fn income_chart_inputs(
    details: &StockDetails,
    metric: fn(&FiscalYear) -> Option<f64>,
    ttm_metric: fn(&aktien_app::TtmIncomeStatement) -> Option<f64>,
) -> (Vec<String>, Vec<Option<f64>>) {
    let mut labels: Vec<String> = details
        .income_statement
        .iter()
        .map(|year| year.year.to_string())
        .collect();
    let mut values: Vec<Option<f64>> = details
        .income_statement
        .iter()
        .map(|year| Some(metric(year).unwrap_or(0.0) / 1e9))
        .collect();
    if let Some(ttm) = &details.ttm_income_statement
        && let Some(value) = ttm_metric(ttm)
    {
        labels.push("TTM".to_owned());
        values.push(Some(value / 1e9));
    }
    (labels, values)
}

#[derive(Debug, Clone, PartialEq)]
struct ChartSeries {
    points: Vec<(f64, f64)>,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

fn chart_series(values: &[Option<f64>]) -> Option<ChartSeries> {
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| value.map(|value| (index as f64, value)))
        .collect();
    if points.is_empty() {
        return None;
    }

    let raw_min = points.iter().map(|point| point.1).fold(f64::INFINITY, f64::min);
    let raw_max = points
        .iter()
        .map(|point| point.1)
        .fold(f64::NEG_INFINITY, f64::max);
    // Keep the zero line in view, like the original charts did.
    let y_min = raw_min.min(0.0);
    let y_max = raw_max.max(0.0);
    let pad = ((y_max - y_min) * 0.05).max(0.1);

    Some(ChartSeries {
        points,
        x_max: values.len().saturating_sub(1).max(1) as f64,
        y_min: if y_min < 0.0 { y_min - pad } else { y_min },
        y_max: y_max + pad,
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], state, view_data);
    render_table(frame, chunks[1], state, view_data);
    render_status(frame, chunks[2], state, view_data);

    if view_data.note.visible {
        render_note_overlay(frame, view_data);
    }
    if view_data.info.visible {
        render_info_overlay(frame, view_data);
    }
    if view_data.favorites.visible {
        render_favorites_overlay(frame, view_data);
    }
    if view_data.columns.visible {
        render_columns_overlay(frame, view_data);
    }
    if view_data.filter.visible {
        render_filter_overlay(frame, view_data);
    }
    if view_data.detail_visible {
        render_detail_overlay(frame, state);
    }
    if view_data.help_visible {
        render_help_overlay(frame);
    }
}

fn render_header(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let titles: Vec<String> = ViewKind::ALL
        .iter()
        .map(|view| view.label().to_owned())
        .collect();
    let selected = ViewKind::ALL
        .iter()
        .position(|view| *view == state.view)
        .unwrap_or(0);

    let mut title = "aktien".to_owned();
    if state.view == ViewKind::Screener {
        if view_data.search.active {
            title = format!("suche: {}_", view_data.search.input);
        } else if !view_data.search.input.is_empty() {
            title = format!("suche: {}", view_data.search.input);
        }
    }

    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(tabs, area);
}

fn table_title(state: &AppState, view_data: &ViewData, shown: usize) -> String {
    let mut parts = vec![format!("{} r:{shown}", state.view.label())];
    if let Some(page) = &view_data.page
        && page.count != shown
    {
        parts.push(format!("server {}", page.count));
    }
    if let Some(sort) = &state.sort {
        let direction = match sort.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        parts.push(format!("sort {}:{direction}", sort.column));
    }
    parts.join(" | ")
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let Some(page) = &view_data.page else {
        let empty = Paragraph::new("Lade Daten...").block(
            Block::default()
                .borders(Borders::ALL)
                .title(state.view.label()),
        );
        frame.render_widget(empty, area);
        return;
    };

    let rows = visible_rows(page, state.view, &view_data.favorite_settings, state.sort.as_ref());

    let mut header_cells: Vec<Cell> = Vec::with_capacity(table_column_count(page));
    header_cells.push(header_cell("Fav", state, "favorite"));
    for column in &page.columns {
        header_cells.push(header_cell(&column.display_name, state, &column.column_key));
    }
    header_cells.push(header_cell("Notizen", state, "notes"));
    let header = Row::new(header_cells);

    let body = rows.iter().enumerate().map(|(row_index, row)| {
        let selected_row = row_index == view_data.selected_row;
        let mut cells: Vec<Cell> = Vec::with_capacity(table_column_count(page));

        let favorite_style = favorite_color(row.favorite)
            .map(|color| Style::default().fg(color))
            .unwrap_or_default();
        cells.push(Cell::from(row.favorite.to_string()).style(cell_style(
            favorite_style,
            selected_row,
            view_data.selected_col == 0,
        )));

        for (column_index, column) in page.columns.iter().enumerate() {
            let value = row.sort_value(&column.column_key);
            let text = format_cell(&value, column.format_type);
            cells.push(Cell::from(text).style(cell_style(
                Style::default(),
                selected_row,
                view_data.selected_col == column_index + 1,
            )));
        }

        let note_mark = if row.notes.is_empty() {
            NOTE_EMPTY_MARK
        } else {
            NOTE_MARK
        };
        cells.push(Cell::from(note_mark).style(cell_style(
            Style::default(),
            selected_row,
            view_data.selected_col == page.columns.len() + 1,
        )));

        Row::new(cells)
    });

    let widths = vec![Constraint::Min(6); table_column_count(page)];
    let table = Table::new(body, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(table_title(state, view_data, rows.len())),
        );
    frame.render_widget(table, area);
}

fn header_cell<'a>(label: &str, state: &AppState, column_key: &str) -> Cell<'a> {
    let mut text = label.to_owned();
    if let Some(sort) = &state.sort
        && sort.column == column_key
    {
        text.push_str(match sort.direction {
            SortDirection::Asc => " ↑",
            SortDirection::Desc => " ↓",
        });
    }
    Cell::from(text).style(
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )
}

fn cell_style(base: Style, selected_row: bool, selected_cell: bool) -> Style {
    let mut style = base;
    if selected_row {
        style = style.bg(Color::DarkGray);
    }
    if selected_row && selected_cell {
        style = Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
    }
    style
}

fn render_status(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let text = match &state.status_line {
        Some(message) => message.clone(),
        None => {
            if view_data.search.active {
                "type to search | enter apply | esc cancel".to_owned()
            } else {
                "tab view | s sort | f favorite | n note | i info | enter detail | F filter | C columns | V favorites | ? help | q quit"
                    .to_owned()
            }
        }
    };
    let status = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, area);
}

fn render_note_overlay(frame: &mut ratatui::Frame<'_>, view_data: &ViewData) {
    let area = centered_rect(50, 30, frame.area());
    frame.render_widget(Clear, area);
    let title = match &view_data.note.isin {
        Some(isin) => format!("Notiz {isin}"),
        None => "Notiz".to_owned(),
    };
    let body = format!(
        "{}_\n\nenter save | esc cancel",
        view_data.note.text
    );
    let paragraph = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);
}

fn info_text(info: &StockInfo) -> String {
    let mut out = String::new();
    out.push_str(info.company_name.as_deref().unwrap_or("-"));
    out.push('\n');
    let mut meta = format!(
        "{} | {} | {}",
        info.ticker.as_deref().unwrap_or("-"),
        info.sector.as_deref().unwrap_or("-"),
        info.country.as_deref().unwrap_or("-"),
    );
    if let Some(fiscal_year_end) = info.fiscal_year_end.as_deref()
        && !fiscal_year_end.is_empty()
    {
        meta.push_str(&format!(" | FJ: {fiscal_year_end}"));
    }
    out.push_str(&meta);
    out.push_str("\n\n");
    match info.description.as_deref() {
        Some(description) if !description.is_empty() => out.push_str(description),
        _ => out.push_str("Keine Beschreibung verfügbar."),
    }
    out.push('\n');
    if let Some(industry) = info.industry.as_deref() {
        out.push_str(&format!("\nBranche: {industry}"));
    }
    if let Some(index) = info.stock_index.as_deref() {
        out.push_str(&format!("\nIndex: {index}"));
    }
    if let Some(currency) = info.currency.as_deref() {
        out.push_str(&format!("\nWährung: {currency}"));
    }
    out
}

fn render_info_overlay(frame: &mut ratatui::Frame<'_>, view_data: &ViewData) {
    let area = centered_rect(60, 60, frame.area());
    frame.render_widget(Clear, area);
    let body = match (&view_data.info.info, &view_data.info.error) {
        (Some(info), _) => info_text(info),
        (None, Some(error)) => format!("Fehler beim Laden der Daten.\n{error}"),
        (None, None) => "Lade Daten...".to_owned(),
    };
    let paragraph = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Unternehmen"));
    frame.render_widget(paragraph, area);
}

fn favorites_lines(favorites: &FavoritesUiState) -> Vec<String> {
    let mut lines = Vec::with_capacity(FavoriteRank::RANKED.len() + 2);
    for (index, rank) in FavoriteRank::RANKED.iter().enumerate() {
        let cursor = if index == favorites.cursor { ">" } else { " " };
        let visible = if favorites.settings.is_visible(*rank) {
            "[x]"
        } else {
            "[ ]"
        };
        let label = if favorites.editing && index == favorites.cursor {
            format!("{}_", favorites.buffer)
        } else {
            favorites.settings.label(*rank)
        };
        lines.push(format!("{cursor} {rank} {visible} {label}"));
    }
    lines.push(String::new());
    lines.push("space visibility | e edit label | enter save | esc close".to_owned());
    lines
}

fn render_favorites_overlay(frame: &mut ratatui::Frame<'_>, view_data: &ViewData) {
    let area = centered_rect(50, 60, frame.area());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(favorites_lines(&view_data.favorites).join("\n")).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Favoriten-Einstellungen"),
    );
    frame.render_widget(paragraph, area);
}

fn columns_toggle_lines(columns: &ColumnsUiState) -> Vec<String> {
    let mut lines = Vec::new();
    let mut flat_index = 0usize;
    for (group_name, group_columns) in &columns.groups {
        lines.push(format!("{group_name}:"));
        for column in group_columns {
            let cursor = if columns.panel == ColumnsPanel::Toggle
                && flat_index == columns.toggle_cursor
            {
                ">"
            } else {
                " "
            };
            let checked = if columns.order.contains(&column.column_key) {
                "[x]"
            } else {
                "[ ]"
            };
            lines.push(format!("{cursor} {checked} {}", column.display_name));
            flat_index += 1;
        }
    }
    lines
}

fn columns_order_lines(columns: &ColumnsUiState) -> Vec<String> {
    let mut lines = Vec::with_capacity(columns.order.len());
    for (index, key) in columns.order.iter().enumerate() {
        let cursor = if columns.panel == ColumnsPanel::Order && index == columns.order_cursor {
            ">"
        } else {
            " "
        };
        let name = columns
            .all
            .iter()
            .find(|column| column.column_key == *key)
            .map(|column| column.display_name.clone())
            .unwrap_or_else(|| key.clone());
        lines.push(format!("{cursor} {:>2}. {name}", index + 1));
    }
    lines
}

fn render_columns_overlay(frame: &mut ratatui::Frame<'_>, view_data: &ViewData) {
    let area = centered_rect(80, 80, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Spalten konfigurieren | tab panel | space toggle | J/K move | enter save | esc close");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(inner);

    let toggle = Paragraph::new(columns_toggle_lines(&view_data.columns).join("\n")).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Spalten auswählen"),
    );
    frame.render_widget(toggle, panels[0]);

    let order = Paragraph::new(columns_order_lines(&view_data.columns).join("\n")).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Reihenfolge"),
    );
    frame.render_widget(order, panels[1]);
}

fn filter_lines(filter: &FilterUiState) -> Vec<String> {
    let mut lines = Vec::new();
    let entries = filter_entries(filter);

    for (entry_index, entry) in entries.iter().enumerate() {
        let cursor = if entry_index == filter.cursor { ">" } else { " " };
        match entry {
            FilterEntry::Categorical(field_index) => {
                let (field, label) = CATEGORICAL_FIELDS[*field_index];
                let value = filter.categorical.get(field).unwrap_or("Alle");
                lines.push(format!("{cursor} {label}: {value}"));
            }
            FilterEntry::Numeric(row_index) => {
                let row = &filter.rows[*row_index];
                let column = if row.column.is_empty() {
                    "Kennzahl wählen..."
                } else {
                    row.column.as_str()
                };
                let value = if row.value.is_empty() {
                    "Wert"
                } else {
                    row.value.as_str()
                };
                lines.push(format!(
                    "{cursor} {column} {} {value}",
                    row.operator.as_str()
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push(
        "←/→ select | c column | o operator | 0-9 value | a add | x remove | r reset | enter apply"
            .to_owned(),
    );
    lines
}

fn render_filter_overlay(frame: &mut ratatui::Frame<'_>, view_data: &ViewData) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(filter_lines(&view_data.filter).join("\n"))
        .block(Block::default().borders(Borders::ALL).title("Filter"));
    frame.render_widget(paragraph, area);
}

fn render_detail_overlay(frame: &mut ratatui::Frame<'_>, state: &AppState) {
    let area = centered_rect(90, 90, frame.area());
    frame.render_widget(Clear, area);

    match &state.detail {
        DetailState::Idle => {}
        DetailState::Loading { isin, .. } => {
            let paragraph = Paragraph::new("Lade Daten...").block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Aktie {isin}")),
            );
            frame.render_widget(paragraph, area);
        }
        DetailState::Failed { message } => {
            let paragraph = Paragraph::new(format!("Fehler beim Laden der Daten.\n{message}"))
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("Aktie"));
            frame.render_widget(paragraph, area);
        }
        DetailState::Ready { details, tab, .. } => {
            render_detail_ready(frame, area, details, *tab);
        }
    }
}

fn render_detail_ready(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    details: &StockDetails,
    tab: DetailTab,
) {
    let name = details.company.name.as_deref().unwrap_or("-");
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("{name} | {}", details.meta_line()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(5)])
        .split(inner);

    let titles: Vec<String> = DetailTab::ALL
        .iter()
        .map(|tab| tab.label().to_owned())
        .collect();
    let selected = DetailTab::ALL.iter().position(|entry| *entry == tab).unwrap_or(0);
    let tabs = Tabs::new(titles).select(selected).highlight_style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(tabs, chunks[0]);

    match tab {
        DetailTab::Pe => render_pe_tab(frame, chunks[1], details),
        DetailTab::EvEbit => render_ev_ebit_tab(frame, chunks[1], details),
        DetailTab::Growth => render_growth_tab(frame, chunks[1], details),
        DetailTab::Margins => render_margins_tab(frame, chunks[1], details),
    }
}

fn overview_table<'a>(rows: Vec<OverviewRow>, with_fwd: bool) -> Table<'a> {
    let mut header = vec![Cell::from(""), Cell::from("Wert"), Cell::from("TTM vs Ø")];
    if with_fwd {
        header.push(Cell::from("Fwd vs Ø"));
    }

    let body: Vec<Row> = rows
        .into_iter()
        .map(|row| {
            let mut cells = vec![
                Cell::from(row.label),
                Cell::from(format_number(row.value)),
                diff_cell(row.ttm_diff),
            ];
            if with_fwd {
                cells.push(diff_cell(row.fwd_diff));
            }
            Row::new(cells)
        })
        .collect();

    let width_count = if with_fwd { 4 } else { 3 };
    Table::new(body, vec![Constraint::Min(8); width_count])
        .header(Row::new(header).style(Style::default().add_modifier(Modifier::BOLD)))
        .column_spacing(1)
}

fn diff_cell<'a>(value: Option<f64>) -> Cell<'a> {
    let mut cell = Cell::from(format_signed_percent(value));
    if let Some(color) = tone_color(Tone::for_multiple_deviation(value)) {
        cell = cell.style(Style::default().fg(color));
    }
    cell
}

fn render_pe_tab(frame: &mut ratatui::Frame<'_>, area: Rect, details: &StockDetails) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(12),
            Constraint::Min(8),
            Constraint::Length(7),
        ])
        .split(area);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    let calc = Paragraph::new(ttm_calc_text(&details.ttm_calculation, details.current_ttm_pe))
        .block(Block::default().borders(Borders::ALL).title("KGV Übersicht"));
    frame.render_widget(calc, top[0]);

    let table = overview_table(pe_overview_rows(&details.pe_overview), true)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(table, top[1]);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    let (pe_labels, pe_values) = pe_chart_inputs(details);
    render_series_chart(
        frame,
        charts[0],
        "KGV Verlauf",
        &pe_labels,
        &pe_values,
        GraphType::Line,
        Color::Cyan,
    );
    let (income_labels, income_values) =
        income_chart_inputs(details, |year| year.net_income, |ttm| ttm.net_income);
    render_series_chart(
        frame,
        charts[1],
        "Net Income Verlauf (Mrd)",
        &income_labels,
        &income_values,
        GraphType::Bar,
        Color::Blue,
    );

    render_income_table(frame, chunks[2], details, true);
}

fn render_ev_ebit_tab(frame: &mut ratatui::Frame<'_>, area: Rect, details: &StockDetails) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(14),
            Constraint::Min(8),
            Constraint::Length(5),
        ])
        .split(area);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    let calc = Paragraph::new(ev_calc_text(
        &details.ev_calculation,
        details.current_ttm_ev_ebit,
    ))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("EV/EBIT Übersicht"),
    );
    frame.render_widget(calc, top[0]);

    let table = overview_table(ev_ebit_overview_rows(&details.ev_ebit_overview), false)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(table, top[1]);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    let (ev_labels, ev_values) = ev_ebit_chart_inputs(details);
    render_series_chart(
        frame,
        charts[0],
        "EV/EBIT Verlauf",
        &ev_labels,
        &ev_values,
        GraphType::Line,
        Color::Cyan,
    );
    let (ebit_labels, ebit_values) =
        income_chart_inputs(details, |year| year.operating_income, |ttm| {
            ttm.operating_income
        });
    render_series_chart(
        frame,
        charts[1],
        "EBIT Verlauf (Mrd)",
        &ebit_labels,
        &ebit_values,
        GraphType::Bar,
        Color::Blue,
    );

    render_income_table(frame, chunks[2], details, false);
}

fn render_income_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    details: &StockDetails,
    full: bool,
) {
    let currency = details.company.currency.as_deref().unwrap_or("EUR");

    let mut header: Vec<Cell> = vec![Cell::from("")];
    for year in &details.income_statement {
        header.push(Cell::from(aktien_app::YearLabel::Fiscal(year.year).short()));
    }
    header.push(Cell::from("TTM"));

    let ttm = details.ttm_income_statement.as_ref();
    let mut metric_rows: Vec<(&str, Vec<Option<f64>>)> = Vec::new();
    let years = &details.income_statement;
    if full {
        metric_rows.push((
            "Revenue",
            years
                .iter()
                .map(|year| year.revenue)
                .chain([ttm.and_then(|ttm| ttm.revenue)])
                .collect(),
        ));
        metric_rows.push((
            "Gross Profit",
            years
                .iter()
                .map(|year| year.gross_profit)
                .chain([ttm.and_then(|ttm| ttm.gross_profit)])
                .collect(),
        ));
        metric_rows.push((
            "Operating Inc",
            years
                .iter()
                .map(|year| year.operating_income)
                .chain([ttm.and_then(|ttm| ttm.operating_income)])
                .collect(),
        ));
        metric_rows.push((
            "Net Income",
            years
                .iter()
                .map(|year| year.net_income)
                .chain([ttm.and_then(|ttm| ttm.net_income)])
                .collect(),
        ));
    } else {
        metric_rows.push((
            "Revenue",
            years
                .iter()
                .map(|year| year.revenue)
                .chain([ttm.and_then(|ttm| ttm.revenue)])
                .collect(),
        ));
        metric_rows.push((
            "EBIT",
            years
                .iter()
                .map(|year| year.operating_income)
                .chain([ttm.and_then(|ttm| ttm.operating_income)])
                .collect(),
        ));
    }

    let body: Vec<Row> = metric_rows
        .into_iter()
        .map(|(label, values)| {
            let mut cells = vec![Cell::from(label)];
            cells.extend(values.into_iter().map(|value| Cell::from(format_billions(value))));
            Row::new(cells)
        })
        .collect();

    let column_count = details.income_statement.len() + 2;
    let table = Table::new(body, vec![Constraint::Min(8); column_count])
        .header(Row::new(header).style(Style::default().add_modifier(Modifier::BOLD)))
        .column_spacing(1)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Income Statement ({currency})")),
        );
    frame.render_widget(table, area);
}

fn render_growth_tab(frame: &mut ratatui::Frame<'_>, area: Rect, details: &StockDetails) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Min(8),
            Constraint::Min(6),
        ])
        .split(area);

    let growth = &details.growth_overview;
    let cagr_rows = vec![
        ("Umsatz", growth.revenue_cagr_3y, growth.revenue_cagr_5y, growth.revenue_cagr_10y),
        ("EBIT", growth.ebit_cagr_3y, growth.ebit_cagr_5y, growth.ebit_cagr_10y),
        (
            "Gewinn",
            growth.net_income_cagr_3y,
            growth.net_income_cagr_5y,
            growth.net_income_cagr_10y,
        ),
    ];
    let body: Vec<Row> = cagr_rows
        .into_iter()
        .map(|(label, y3, y5, y10)| {
            Row::new(vec![
                Cell::from(label),
                rate_cell(y3),
                rate_cell(y5),
                rate_cell(y10),
            ])
        })
        .collect();
    let cagr = Table::new(body, vec![Constraint::Min(9); 4])
        .header(
            Row::new(vec!["", "3 Jahre", "5 Jahre", "10 Jahre"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .column_spacing(1)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("CAGR Übersicht"),
        );
    frame.render_widget(cagr, chunks[0]);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    let (revenue_labels, revenue_values) =
        income_chart_inputs(details, |year| year.revenue, |ttm| ttm.revenue);
    render_series_chart(
        frame,
        charts[0],
        "Umsatz-Entwicklung (Mrd)",
        &revenue_labels,
        &revenue_values,
        GraphType::Bar,
        Color::Green,
    );
    let (income_labels, income_values) =
        income_chart_inputs(details, |year| year.net_income, |ttm| ttm.net_income);
    render_series_chart(
        frame,
        charts[1],
        "Gewinn-Entwicklung (Mrd)",
        &income_labels,
        &income_values,
        GraphType::Bar,
        Color::Blue,
    );

    let rows = growth_rows(
        &details.income_statement,
        details.ttm_income_statement.as_ref(),
    );
    let body: Vec<Row> = rows
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.label.short()),
                Cell::from(format_billions(row.revenue)),
                rate_cell(row.revenue_growth),
                Cell::from(format_billions(row.net_income)),
                rate_cell(row.net_income_growth),
                Cell::from(format_percent(row.profit_margin)),
            ])
        })
        .collect();
    let currency = details.company.currency.as_deref().unwrap_or("EUR");
    let table = Table::new(body, vec![Constraint::Min(8); 6])
        .header(
            Row::new(vec!["Jahr", "Umsatz", "YoY", "Gewinn", "YoY", "Marge"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .column_spacing(1)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Wachstum pro Jahr ({currency})")),
        );
    frame.render_widget(table, chunks[2]);
}

fn rate_cell<'a>(value: Option<f64>) -> Cell<'a> {
    let mut cell = Cell::from(format_signed_percent(value));
    if let Some(color) = tone_color(Tone::for_rate(value)) {
        cell = cell.style(Style::default().fg(color));
    }
    cell
}

fn current_gross_margin(details: &StockDetails) -> Option<f64> {
    let last = details.income_statement.last()?;
    aktien_app::derive::margin_of(last.gross_profit, last.revenue)
}

fn render_margins_tab(frame: &mut ratatui::Frame<'_>, area: Rect, details: &StockDetails) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Min(8),
            Constraint::Min(6),
        ])
        .split(area);

    let margins = &details.margins_overview;
    let overview_rows = vec![
        (
            "Bruttomarge",
            current_gross_margin(details),
            None,
            None,
            None,
            None,
        ),
        (
            "Op. Marge",
            margins.operating_margin,
            margins.operating_margin_avg_3y,
            margins.operating_margin_avg_5y,
            margins.operating_margin_avg_10y,
            margins.operating_margin_avg_5y_2019,
        ),
        (
            "Gewinnmarge",
            margins.profit_margin,
            margins.profit_margin_avg_3y,
            margins.profit_margin_avg_5y,
            margins.profit_margin_avg_10y,
            margins.profit_margin_avg_5y_2019,
        ),
    ];
    let body: Vec<Row> = overview_rows
        .into_iter()
        .map(|(label, current, avg3, avg5, avg10, avg_2019)| {
            Row::new(vec![
                Cell::from(label),
                Cell::from(format_percent(current)),
                Cell::from(format_percent(avg3)),
                Cell::from(format_percent(avg5)),
                Cell::from(format_percent(avg10)),
                Cell::from(format_percent(avg_2019)),
            ])
        })
        .collect();
    let overview = Table::new(body, vec![Constraint::Min(8); 6])
        .header(
            Row::new(vec!["", "Aktuell", "Ø 3J", "Ø 5J", "Ø 10J", "Ø 15-19"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .column_spacing(1)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Margen Übersicht"),
        );
    frame.render_widget(overview, chunks[0]);

    let rows = margin_rows(
        &details.income_statement,
        details.ttm_income_statement.as_ref(),
    );

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    let margin_labels: Vec<String> = rows.iter().map(|row| row.label.short()).collect();
    let profit_values: Vec<Option<f64>> = rows.iter().map(|row| row.profit_margin).collect();
    render_series_chart(
        frame,
        charts[0],
        "Gewinnmarge-Entwicklung (%)",
        &margin_labels,
        &profit_values,
        GraphType::Line,
        Color::Cyan,
    );
    let (revenue_labels, revenue_values) =
        income_chart_inputs(details, |year| year.revenue, |ttm| ttm.revenue);
    render_series_chart(
        frame,
        charts[1],
        "Umsatz & Gewinn (Mrd)",
        &revenue_labels,
        &revenue_values,
        GraphType::Bar,
        Color::Green,
    );

    let body: Vec<Row> = rows
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.label.short()),
                Cell::from(format_billions(row.revenue)),
                Cell::from(format_billions(row.gross_profit)),
                Cell::from(format_percent(row.gross_margin)),
                Cell::from(format_billions(row.operating_income)),
                Cell::from(format_percent(row.operating_margin)),
                Cell::from(format_percent(row.profit_margin)),
            ])
        })
        .collect();
    let currency = details.company.currency.as_deref().unwrap_or("EUR");
    let table = Table::new(body, vec![Constraint::Min(8); 7])
        .header(
            Row::new(vec![
                "Jahr", "Umsatz", "Brutto", "Brutto%", "Op.Inc", "Op.%", "Gewinn%",
            ])
            .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .column_spacing(1)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Margen pro Jahr ({currency})")),
        );
    frame.render_widget(table, chunks[2]);
}

fn render_series_chart(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    title: &str,
    labels: &[String],
    values: &[Option<f64>],
    graph_type: GraphType,
    color: Color,
) {
    let Some(series) = chart_series(values) else {
        let empty = Paragraph::new("-")
            .block(Block::default().borders(Borders::ALL).title(title.to_owned()));
        frame.render_widget(empty, area);
        return;
    };

    let x_labels: Vec<String> = match labels.len() {
        0 => Vec::new(),
        1 => vec![labels[0].clone()],
        len => vec![labels[0].clone(), labels[len - 1].clone()],
    };
    let y_labels = vec![
        format_de(series.y_min, 1),
        format_de((series.y_min + series.y_max) / 2.0, 1),
        format_de(series.y_max, 1),
    ];

    let datasets = vec![
        Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(graph_type)
            .style(Style::default().fg(color))
            .data(&series.points),
    ];
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title.to_owned()))
        .x_axis(
            Axis::default()
                .bounds([0.0, series.x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .bounds([series.y_min, series.y_max])
                .labels(y_labels),
        );
    frame.render_widget(chart, area);
}

fn render_help_overlay(frame: &mut ratatui::Frame<'_>) {
    let area = centered_rect(60, 70, frame.area());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(help_overlay_text())
        .block(Block::default().borders(Borders::ALL).title("Hilfe"));
    frame.render_widget(paragraph, area);
}

fn help_overlay_text() -> &'static str {
    "tab        switch watchlist/screener\n\
     arrows/hjkl  move selection\n\
     s / S      sort column / clear sort\n\
     f          cycle favorite rank 0-9\n\
     n          edit note\n\
     i          company info\n\
     enter      detail drill-down on metric columns\n\
     /          search (screener)\n\
     F          filter overlay (screener)\n\
     C          column configuration\n\
     V          favorite settings\n\
     R          reload view\n\
     1-4, ←/→   detail tabs\n\
     esc        close overlay\n\
     q, ctrl-q  quit"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, ColumnsPanel, FilterUiState, InternalEvent, NumericFilterRow, ViewData,
        chart_series, column_key_at, columns_order_lines, columns_toggle_lines, cycle_option,
        detail_tab_for_column, dispatch_and_spawn, ev_calc_text, ev_ebit_chart_inputs,
        favorites_lines, filter_lines, format_billions, format_cell, format_de, format_percent,
        format_signed_percent, handle_key_event, help_overlay_text, income_chart_inputs,
        info_text, pe_chart_inputs, process_internal_events, refresh_view, table_column_count,
        ttm_calc_text, visible_rows,
    };
    use aktien_app::{
        AppCommand, AppState, CellValue, ColumnConfig, ColumnFormat, ColumnUpdate, CompareOp,
        DetailState, DetailTab, FavoriteRank, FavoriteSettings, FilterOptions, FilterSet, Isin,
        NumericFilter, ScreenerPage, SortDirection, SortSpec, StockDetails, StockInfo, ViewKind,
    };
    use aktien_testkit::{
        load_view_page, sample_column_config, sample_details, sample_favorite_settings,
        sample_filter_options, sample_screener_page, sample_stock_info,
    };
    use anyhow::{Result, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::sync::mpsc::{self, Receiver, Sender};

    #[derive(Debug, Default)]
    struct TestRuntime {
        detail_fetches: usize,
        fail_details: bool,
        applied_filters: Vec<FilterSet>,
        persisted_filters: Vec<(ViewKind, FilterSet)>,
        cleared_filters: usize,
        saved_filters: Option<FilterSet>,
        favorites_set: Vec<(Isin, FavoriteRank)>,
        notes_set: Vec<(Isin, String)>,
        saved_settings: Option<FavoriteSettings>,
        saved_columns: Vec<(ViewKind, Vec<ColumnUpdate>)>,
    }

    impl AppRuntime for TestRuntime {
        fn load_view(&mut self, view: ViewKind) -> Result<ScreenerPage> {
            Ok(load_view_page(view))
        }

        fn apply_screener_filters(&mut self, filters: &FilterSet) -> Result<ScreenerPage> {
            self.applied_filters.push(filters.clone());
            Ok(sample_screener_page())
        }

        fn load_filter_options(&mut self) -> Result<FilterOptions> {
            Ok(sample_filter_options())
        }

        fn load_saved_filters(&mut self, _view: ViewKind) -> Result<Option<FilterSet>> {
            Ok(self.saved_filters.clone())
        }

        fn persist_filters(&mut self, view: ViewKind, filters: &FilterSet) -> Result<()> {
            self.persisted_filters.push((view, filters.clone()));
            Ok(())
        }

        fn clear_saved_filters(&mut self, _view: ViewKind) -> Result<()> {
            self.cleared_filters += 1;
            self.saved_filters = None;
            Ok(())
        }

        fn set_favorite(&mut self, isin: &Isin, favorite: FavoriteRank) -> Result<()> {
            self.favorites_set.push((isin.clone(), favorite));
            Ok(())
        }

        fn set_note(&mut self, isin: &Isin, notes: &str) -> Result<()> {
            self.notes_set.push((isin.clone(), notes.to_owned()));
            Ok(())
        }

        fn load_favorite_settings(&mut self) -> Result<FavoriteSettings> {
            Ok(sample_favorite_settings())
        }

        fn save_favorite_settings(&mut self, settings: &FavoriteSettings) -> Result<()> {
            self.saved_settings = Some(settings.clone());
            Ok(())
        }

        fn load_columns(&mut self, _view: ViewKind) -> Result<ColumnConfig> {
            Ok(sample_column_config())
        }

        fn save_columns(&mut self, view: ViewKind, updates: &[ColumnUpdate]) -> Result<()> {
            self.saved_columns.push((view, updates.to_vec()));
            Ok(())
        }

        fn fetch_stock_details(&mut self, _isin: &Isin) -> Result<StockDetails> {
            self.detail_fetches += 1;
            if self.fail_details {
                bail!("details unavailable");
            }
            Ok(sample_details())
        }

        fn load_stock_info(&mut self, _isin: &Isin) -> Result<StockInfo> {
            Ok(sample_stock_info())
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    type Fixture = (
        AppState,
        TestRuntime,
        ViewData,
        Sender<InternalEvent>,
        Receiver<InternalEvent>,
    );

    fn setup(view: ViewKind) -> Fixture {
        let mut state = AppState::default();
        state.view = view;
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        refresh_view(&mut state, &mut runtime, &mut view_data).expect("initial load");
        let (tx, rx) = mpsc::channel();
        (state, runtime, view_data, tx, rx)
    }

    fn press(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &Sender<InternalEvent>,
        code: KeyCode,
    ) {
        assert!(!handle_key_event(state, runtime, view_data, tx, key(code)));
    }

    fn type_text(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &Sender<InternalEvent>,
        text: &str,
    ) {
        for ch in text.chars() {
            press(state, runtime, view_data, tx, KeyCode::Char(ch));
        }
    }

    #[test]
    fn watchlist_projection_hides_unranked_and_hidden_ranks() {
        let page = sample_screener_page();
        let mut settings = FavoriteSettings::default();
        settings.toggle_visible(2);

        let rows = visible_rows(&page, ViewKind::Watchlist, &settings, None);
        let names: Vec<&str> = rows.iter().map(|row| row.company_name()).collect();
        // Allianz has rank 0, Apple's rank 2 is filtered out.
        assert_eq!(names, vec!["SAP SE"]);
    }

    #[test]
    fn watchlist_projection_orders_by_rank_then_name() {
        let page = sample_screener_page();
        let rows = visible_rows(
            &page,
            ViewKind::Watchlist,
            &FavoriteSettings::default(),
            None,
        );
        let names: Vec<&str> = rows.iter().map(|row| row.company_name()).collect();
        assert_eq!(names, vec!["SAP SE", "Apple Inc."]);
    }

    #[test]
    fn screener_projection_sorts_with_missing_values_last() {
        let page = sample_screener_page();
        let sort = SortSpec {
            column: "ttm_pe".to_owned(),
            direction: SortDirection::Asc,
        };
        let rows = visible_rows(
            &page,
            ViewKind::Screener,
            &FavoriteSettings::default(),
            Some(&sort),
        );
        let names: Vec<&str> = rows.iter().map(|row| row.company_name()).collect();
        assert_eq!(names, vec!["Allianz SE", "SAP SE", "Apple Inc."]);
    }

    #[test]
    fn table_layout_exposes_favorite_and_notes_columns() {
        let page = sample_screener_page();
        assert_eq!(table_column_count(&page), page.columns.len() + 2);
        assert_eq!(column_key_at(&page, 0).as_deref(), Some("favorite"));
        assert_eq!(column_key_at(&page, 1).as_deref(), Some("company_name"));
        assert_eq!(
            column_key_at(&page, page.columns.len() + 1).as_deref(),
            Some("notes")
        );
        assert_eq!(column_key_at(&page, page.columns.len() + 2), None);
    }

    #[test]
    fn metric_columns_map_to_detail_tabs() {
        assert_eq!(detail_tab_for_column("ttm_pe"), Some(DetailTab::Pe));
        assert_eq!(detail_tab_for_column("pe_avg_10y"), Some(DetailTab::Pe));
        assert_eq!(detail_tab_for_column("yf_forward_pe"), Some(DetailTab::Pe));
        assert_eq!(
            detail_tab_for_column("yf_fwd_pe_vs_avg_5y"),
            Some(DetailTab::Pe)
        );
        assert_eq!(
            detail_tab_for_column("ttm_ev_ebit"),
            Some(DetailTab::EvEbit)
        );
        assert_eq!(
            detail_tab_for_column("ev_ebit_vs_avg_10y_2019"),
            Some(DetailTab::EvEbit)
        );
        assert_eq!(
            detail_tab_for_column("revenue_cagr_5y"),
            Some(DetailTab::Growth)
        );
        assert_eq!(
            detail_tab_for_column("operating_margin_avg_3y"),
            Some(DetailTab::Margins)
        );
        assert_eq!(detail_tab_for_column("company_name"), None);
        assert_eq!(detail_tab_for_column("price"), None);
    }

    #[test]
    fn german_number_formatting() {
        assert_eq!(format_de(1234.5, 1), "1.234,5");
        assert_eq!(format_de(-1234567.0, 2), "-1.234.567,00");
        assert_eq!(format_de(0.0, 0), "0");
        assert_eq!(format_billions(Some(2.5e9)), "2,50 Mrd");
        assert_eq!(format_billions(None), "-");
        assert_eq!(format_percent(Some(12.3)), "12,3%");
        assert_eq!(format_signed_percent(Some(10.0)), "+10,0%");
        assert_eq!(format_signed_percent(Some(-3.5)), "-3,5%");
        assert_eq!(format_signed_percent(None), "-");
    }

    #[test]
    fn cell_formatting_follows_the_column_format() {
        assert_eq!(
            format_cell(&CellValue::Number(1.5e9), ColumnFormat::Billions),
            "1,5"
        );
        assert_eq!(
            format_cell(&CellValue::Number(98.5), ColumnFormat::Currency),
            "98,50"
        );
        assert_eq!(
            format_cell(&CellValue::Number(7.3), ColumnFormat::Percent),
            "7,3%"
        );
        assert_eq!(format_cell(&CellValue::Null, ColumnFormat::Number), "-");
        assert_eq!(
            format_cell(
                &CellValue::Text("SAP SE".to_owned()),
                ColumnFormat::Text
            ),
            "SAP SE"
        );
    }

    #[test]
    fn chart_series_skips_gaps_and_keeps_zero_in_view() {
        let series = chart_series(&[Some(5.0), None, Some(10.0)]).expect("series");
        assert_eq!(series.points, vec![(0.0, 5.0), (2.0, 10.0)]);
        assert_eq!(series.y_min, 0.0);
        assert!(series.y_max > 10.0);
        assert_eq!(series.x_max, 2.0);

        let negative = chart_series(&[Some(-5.0)]).expect("series");
        assert!(negative.y_min < -5.0);
        assert!(negative.y_max >= 0.0);

        assert_eq!(chart_series(&[None, None]), None);
    }

    #[test]
    fn chart_inputs_append_the_ttm_point() {
        let details = sample_details();

        let (labels, values) = pe_chart_inputs(&details);
        assert_eq!(labels, vec!["2023", "2024", "TTM"]);
        assert_eq!(values.last(), Some(&Some(20.0)));

        let (labels, values) = ev_ebit_chart_inputs(&details);
        assert_eq!(labels.last().map(String::as_str), Some("TTM"));
        assert_eq!(values.last(), Some(&Some(16.2)));

        let (labels, values) =
            income_chart_inputs(&details, |year| year.net_income, |ttm| ttm.net_income);
        assert_eq!(labels, vec!["2023", "2024", "TTM"]);
        assert_eq!(values, vec![Some(9.0), Some(11.0), Some(10.0)]);
    }

    #[test]
    fn ttm_point_is_omitted_when_unavailable() {
        let mut details = sample_details();
        details.current_ttm_pe = None;
        details.ttm_income_statement = None;

        let (labels, _) = pe_chart_inputs(&details);
        assert_eq!(labels, vec!["2023", "2024"]);

        let (labels, values) =
            income_chart_inputs(&details, |year| year.revenue, |ttm| ttm.revenue);
        assert_eq!(labels.len(), 2);
        assert_eq!(values, vec![Some(100.0), Some(110.0)]);
    }

    #[test]
    fn calc_boxes_show_components_and_sums() {
        let details = sample_details();
        let ttm_text = ttm_calc_text(&details.ttm_calculation, details.current_ttm_pe);
        assert!(ttm_text.contains("Market Cap"));
        assert!(ttm_text.contains("200,00 Mrd"));
        assert!(ttm_text.contains("Q2 2025"));
        assert!(ttm_text.contains("Summe"));

        let ev_text = ev_calc_text(&details.ev_calculation, details.current_ttm_ev_ebit);
        assert!(ev_text.contains("+ Net Debt"));
        assert!(ev_text.contains("= EV"));
        assert!(ev_text.contains("211,00 Mrd"));
        assert!(ev_text.contains("16,2"));
    }

    #[test]
    fn cycle_option_walks_through_all_and_back() {
        let values = vec!["DAX".to_owned(), "MDAX".to_owned()];
        assert_eq!(cycle_option(None, &values, 1).as_deref(), Some("DAX"));
        assert_eq!(cycle_option(Some("DAX"), &values, 1).as_deref(), Some("MDAX"));
        assert_eq!(cycle_option(Some("MDAX"), &values, 1), None);
        assert_eq!(cycle_option(None, &values, -1).as_deref(), Some("MDAX"));
        assert_eq!(cycle_option(None, &[], 1), None);
    }

    #[test]
    fn search_applies_persists_and_replaces_the_page() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Screener);

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('/'));
        assert!(view_data.search.active);
        type_text(&mut state, &mut runtime, &mut view_data, &tx, "sap");
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);

        assert!(!view_data.search.active);
        let applied = runtime.applied_filters.last().expect("filters applied");
        assert_eq!(applied.search, "sap");
        let (view, persisted) = runtime.persisted_filters.last().expect("filters persisted");
        assert_eq!(*view, ViewKind::Screener);
        assert_eq!(persisted.search, "sap");
        assert!(view_data.page.is_some());
    }

    #[test]
    fn search_is_rejected_on_the_watchlist() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Watchlist);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('/'));
        assert!(!view_data.search.active);
        assert_eq!(state.status_line.as_deref(), Some("search only on screener"));
    }

    #[test]
    fn filter_overlay_composes_only_complete_rows() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Screener);

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('F'));
        assert!(view_data.filter.visible);
        assert_eq!(view_data.filter.rows.len(), 1);

        // Move onto the numeric row (below the four categorical fields).
        for _ in 0..4 {
            press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Down);
        }
        // Pick the first numeric column and type a threshold.
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('c'));
        type_text(&mut state, &mut runtime, &mut view_data, &tx, "15");
        // A second, incomplete row must be dropped on apply.
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('a'));
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);

        assert!(!view_data.filter.visible);
        let applied = runtime.applied_filters.last().expect("filters applied");
        assert_eq!(
            applied.numeric,
            vec![NumericFilter {
                column: "price".to_owned(),
                operator: CompareOp::Lt,
                value: 15.0,
            }]
        );
    }

    #[test]
    fn categorical_selects_cycle_and_apply() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Screener);

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('F'));
        // First entry is the stock_index select.
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Right);
        assert_eq!(
            view_data.filter.categorical.get("stock_index"),
            Some("DAX")
        );
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);

        let applied = runtime.applied_filters.last().expect("filters applied");
        assert_eq!(applied.stock_index.as_deref(), Some("DAX"));
    }

    #[test]
    fn reset_clears_state_store_and_refetches_unfiltered() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Screener);
        view_data.search.input = "sap".to_owned();
        view_data.filter.rows = vec![NumericFilterRow {
            column: "ttm_pe".to_owned(),
            operator: CompareOp::Le,
            value: "15".to_owned(),
        }];

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('F'));
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('r'));

        assert!(view_data.search.input.is_empty());
        assert_eq!(view_data.filter.rows, vec![NumericFilterRow::blank()]);
        assert_eq!(runtime.cleared_filters, 1);
        let applied = runtime.applied_filters.last().expect("filters applied");
        assert!(applied.is_empty());
    }

    #[test]
    fn saved_filters_are_restored_and_reapplied_on_load() {
        let mut state = AppState::default();
        state.view = ViewKind::Screener;
        let mut runtime = TestRuntime {
            saved_filters: Some(FilterSet {
                search: "bay".to_owned(),
                country: Some("Deutschland".to_owned()),
                numeric: vec![NumericFilter {
                    column: "ttm_pe".to_owned(),
                    operator: CompareOp::Lt,
                    value: 12.0,
                }],
                ..FilterSet::default()
            }),
            ..TestRuntime::default()
        };
        let mut view_data = ViewData::default();
        refresh_view(&mut state, &mut runtime, &mut view_data).expect("load");

        assert_eq!(view_data.search.input, "bay");
        assert_eq!(
            view_data.filter.categorical.get("country"),
            Some("Deutschland")
        );
        assert_eq!(view_data.filter.rows.len(), 1);
        let applied = runtime.applied_filters.last().expect("saved set reapplied");
        assert_eq!(applied.search, "bay");
    }

    #[test]
    fn column_save_payload_numbers_visible_then_hidden() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Screener);

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('C'));
        assert!(view_data.columns.visible);
        // Visible order restored from the stored configuration.
        let order: Vec<&str> = view_data.columns.order.iter().map(String::as_str).collect();
        assert_eq!(order, vec!["company_name", "price", "ttm_pe", "ttm_ev_ebit"]);

        // Hide company_name, then move the new first entry down one slot.
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char(' '));
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Tab);
        assert_eq!(view_data.columns.panel, ColumnsPanel::Order);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('J'));
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);

        let (view, updates) = runtime.saved_columns.last().expect("columns saved");
        assert_eq!(*view, ViewKind::Screener);
        assert_eq!(updates.len(), 8);

        let mut keys: Vec<&str> = updates
            .iter()
            .map(|update| update.column_key.as_str())
            .collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 8);

        let visible: Vec<(&str, i64)> = updates
            .iter()
            .filter(|update| update.is_visible)
            .map(|update| (update.column_key.as_str(), update.sort_order))
            .collect();
        assert_eq!(
            visible,
            vec![("ttm_pe", 1), ("price", 2), ("ttm_ev_ebit", 3)]
        );
        assert!(
            updates
                .iter()
                .filter(|update| !update.is_visible)
                .all(|update| update.sort_order > 3)
        );
        assert!(!view_data.columns.visible);
    }

    #[test]
    fn favorite_settings_save_updates_the_watchlist_filter() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Watchlist);

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('V'));
        assert!(view_data.favorites.visible);
        // Hide rank 1 and rename it.
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char(' '));
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('e'));
        for _ in 0..view_data.favorites.buffer.len() {
            press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Backspace);
        }
        type_text(&mut state, &mut runtime, &mut view_data, &tx, "Qualität");
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);

        let saved = runtime.saved_settings.as_ref().expect("settings saved");
        assert!(!saved.is_visible(1));
        assert_eq!(saved.label(1), "Qualität");
        assert!(!view_data.favorites.visible);
    }

    #[test]
    fn note_save_updates_the_row_in_place() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Watchlist);

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('n'));
        assert!(view_data.note.visible);
        type_text(&mut state, &mut runtime, &mut view_data, &tx, "halten");
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);

        assert!(!view_data.note.visible);
        let (isin, notes) = runtime.notes_set.last().expect("note saved");
        assert_eq!(isin.as_str(), "DE0007164600");
        assert_eq!(notes, "halten");
        let page = view_data.page.as_ref().expect("page");
        let stored = page
            .stocks
            .iter()
            .find(|row| row.isin.as_str() == "DE0007164600")
            .expect("row");
        assert_eq!(stored.notes, "halten");
    }

    #[test]
    fn favorite_cycles_and_wraps_to_zero() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Watchlist);

        // First watchlist row is SAP with rank 1.
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('f'));
        let (isin, rank) = runtime.favorites_set.last().expect("favorite saved");
        assert_eq!(isin.as_str(), "DE0007164600");
        assert_eq!(rank.get(), 2);

        let page = view_data.page.as_ref().expect("page");
        let stored = page
            .stocks
            .iter()
            .find(|row| row.isin.as_str() == "DE0007164600")
            .expect("row");
        assert_eq!(stored.favorite.get(), 2);
    }

    #[test]
    fn detail_tab_switch_reuses_the_cached_payload() {
        let (mut state, mut runtime, mut view_data, tx, rx) = setup(ViewKind::Screener);

        // Column 3 of the layout is ttm_pe (fav, company_name, price, ttm_pe).
        view_data.selected_col = 3;
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);
        process_internal_events(&mut state, &mut view_data, &rx);

        assert_eq!(runtime.detail_fetches, 1);
        assert!(view_data.detail_visible);
        assert!(matches!(state.detail, DetailState::Ready { .. }));
        assert_eq!(state.detail.active_tab(), Some(DetailTab::Pe));

        // Tab switches render from the cache; no further request.
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('3'));
        process_internal_events(&mut state, &mut view_data, &rx);
        assert_eq!(state.detail.active_tab(), Some(DetailTab::Growth));
        assert_eq!(runtime.detail_fetches, 1);

        // Closing keeps the cached payload around.
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Esc);
        assert!(!view_data.detail_visible);
        assert!(matches!(state.detail, DetailState::Ready { .. }));

        // Re-opening always fetches fresh.
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);
        process_internal_events(&mut state, &mut view_data, &rx);
        assert_eq!(runtime.detail_fetches, 2);
    }

    #[test]
    fn stale_detail_response_never_overwrites_the_newer_request() {
        let (mut state, mut runtime, mut view_data, tx, rx) = setup(ViewKind::Screener);

        // Two opens back to back; both inline fetches land in the channel in
        // order, so the first one is stale by the time it is processed.
        dispatch_and_spawn(
            &mut state,
            &mut runtime,
            &tx,
            AppCommand::OpenDetail {
                isin: Isin::new("DE0007164600"),
                tab: DetailTab::Pe,
            },
        );
        dispatch_and_spawn(
            &mut state,
            &mut runtime,
            &tx,
            AppCommand::OpenDetail {
                isin: Isin::new("US0378331005"),
                tab: DetailTab::EvEbit,
            },
        );
        process_internal_events(&mut state, &mut view_data, &rx);

        assert_eq!(runtime.detail_fetches, 2);
        match &state.detail {
            DetailState::Ready { isin, tab, .. } => {
                assert_eq!(isin.as_str(), "US0378331005");
                assert_eq!(*tab, DetailTab::EvEbit);
            }
            other => panic!("expected ready state, got {other:?}"),
        }
    }

    #[test]
    fn failed_detail_fetch_lands_in_the_failed_state() {
        let (mut state, mut runtime, mut view_data, tx, rx) = setup(ViewKind::Screener);
        runtime.fail_details = true;

        view_data.selected_col = 3;
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Enter);
        process_internal_events(&mut state, &mut view_data, &rx);

        match &state.detail {
            DetailState::Failed { message } => assert!(message.contains("details unavailable")),
            other => panic!("expected failed state, got {other:?}"),
        }
    }

    #[test]
    fn tab_key_switches_the_view_and_reloads() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Watchlist);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Tab);

        assert_eq!(state.view, ViewKind::Screener);
        let page = view_data.page.as_ref().expect("page loaded");
        assert_eq!(page.stocks.len(), 3);
    }

    #[test]
    fn company_info_opens_for_the_selected_row() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Watchlist);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('i'));

        assert!(view_data.info.visible);
        let info = view_data.info.info.as_ref().expect("info loaded");
        assert_eq!(info.company_name.as_deref(), Some("SAP SE"));

        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Esc);
        assert!(!view_data.info.visible);
    }

    #[test]
    fn sort_key_uses_the_selected_column() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Screener);

        view_data.selected_col = 3;
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('s'));
        assert_eq!(
            state.sort.as_ref().map(|sort| sort.column.as_str()),
            Some("ttm_pe")
        );
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('s'));
        assert_eq!(
            state.sort.as_ref().map(|sort| sort.direction),
            Some(SortDirection::Desc)
        );
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('S'));
        assert!(state.sort.is_none());
    }

    #[test]
    fn quit_keys_end_the_loop() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Watchlist);
        assert!(handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            key(KeyCode::Char('q')),
        ));
        assert!(handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL),
        ));
    }

    #[test]
    fn overlay_text_builders_render_sensible_lines() {
        let favorites = super::FavoritesUiState {
            visible: true,
            settings: sample_favorite_settings(),
            cursor: 0,
            editing: false,
            buffer: String::new(),
        };
        let lines = favorites_lines(&favorites);
        assert_eq!(lines[0], "> 1 [x] Kaufen");
        assert!(lines[2].starts_with("  3 [ ]"));

        let mut filter = FilterUiState::default();
        filter.options = Some(sample_filter_options());
        filter.rows = vec![NumericFilterRow {
            column: "ttm_pe".to_owned(),
            operator: CompareOp::Le,
            value: "15".to_owned(),
        }];
        let lines = filter_lines(&filter);
        assert!(lines[0].contains("Index: Alle"));
        assert!(lines.iter().any(|line| line.contains("ttm_pe <= 15")));

        let info = info_text(&sample_stock_info());
        assert!(info.contains("SAP SE"));
        assert!(info.contains("FJ: 31.12."));
        assert!(info.contains("Branche: Software"));

        assert!(help_overlay_text().contains("switch watchlist/screener"));
    }

    #[test]
    fn columns_overlay_lines_mark_cursor_and_checked_state() {
        let (mut state, mut runtime, mut view_data, tx, _rx) = setup(ViewKind::Screener);
        press(&mut state, &mut runtime, &mut view_data, &tx, KeyCode::Char('C'));

        let toggle = columns_toggle_lines(&view_data.columns);
        assert_eq!(toggle[0], "Stammdaten:");
        assert!(toggle[1].starts_with("> [x] Name"));
        assert!(toggle.iter().any(|line| line.contains("[ ] Ticker")));

        let order = columns_order_lines(&view_data.columns);
        assert_eq!(order.len(), 4);
        assert!(order[0].contains("1. Name"));
    }
}
