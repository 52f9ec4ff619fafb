// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Local persistence for the screener filter state: one JSON payload per
//! view, surviving restarts the way the original client kept a single
//! browser-local-storage entry.

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, OptionalExtension, params};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use aktien_app::{FilterSet, ViewKind};

pub const APP_NAME: &str = "aktien";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS saved_filters (
                  view_name TEXT PRIMARY KEY,
                  payload TEXT NOT NULL,
                  updated_at TEXT NOT NULL
                );
                ",
            )
            .context("create schema")
    }

    pub fn save_filters(&self, view: ViewKind, filters: &FilterSet) -> Result<()> {
        let payload = serde_json::to_string(filters).context("encode filter set")?;
        let updated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("format timestamp")?;
        self.conn
            .execute(
                "INSERT INTO saved_filters (view_name, payload, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(view_name) DO UPDATE
                 SET payload = excluded.payload, updated_at = excluded.updated_at",
                params![view.as_str(), payload, updated_at],
            )
            .with_context(|| format!("save filters for {}", view.as_str()))?;
        Ok(())
    }

    /// Returns the persisted filter set, `None` when nothing was saved. A
    /// payload that no longer decodes is an error; callers log it and fall
    /// back to empty filters rather than crashing.
    pub fn load_filters(&self, view: ViewKind) -> Result<Option<FilterSet>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM saved_filters WHERE view_name = ?1",
                params![view.as_str()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("read saved filters for {}", view.as_str()))?;

        match payload {
            None => Ok(None),
            Some(payload) => {
                let filters = serde_json::from_str(&payload).with_context(|| {
                    format!("decode saved filters for {}", view.as_str())
                })?;
                Ok(Some(filters))
            }
        }
    }

    pub fn clear_filters(&self, view: ViewKind) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM saved_filters WHERE view_name = ?1",
                params![view.as_str()],
            )
            .with_context(|| format!("clear saved filters for {}", view.as_str()))?;
        Ok(())
    }
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("AKTIEN_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set AKTIEN_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("aktien.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}
