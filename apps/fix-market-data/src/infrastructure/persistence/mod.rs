//! SQLite Audit Store
//!
//! Durable record of issued requests and every extracted entry, backed by
//! SQLite. Implements the [`AuditSink`] port.
//!
//! # Tables
//!
//! | Table        | Holds                                   |
//! |--------------|-----------------------------------------|
//! | `sessions`   | one row per issued request              |
//! | `trades`     | trade prints                            |
//! | `order_book` | bid / offer levels                      |
//! | `ohlcv`      | open, high, low, close and volume values|
//!
//! Prices and sizes are stored as the text received on the wire. Entries
//! of unrecognized kinds are not stored.

use std::path::Path;

use chrono::SecondsFormat;
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, params};
use serde::Serialize;

use crate::application::ports::{AuditError, AuditSink, SessionRecord};
use crate::domain::market_data::{AggressorSide, EntryKind, MarketDataBatch, NormalizedRecord};

// =============================================================================
// Schema
// =============================================================================

const AUDIT_SCHEMA: &str = r"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    request_type TEXT NOT NULL,
    data_types TEXT NOT NULL,
    depth INTEGER,
    md_req_id TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    is_active INTEGER DEFAULT 1
);

CREATE TABLE IF NOT EXISTS trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    price TEXT NOT NULL,
    size TEXT NOT NULL,
    aggressor_side TEXT,
    trade_time TEXT,
    seq_num INTEGER,
    md_req_id TEXT,
    is_snapshot INTEGER NOT NULL,
    received_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_book (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    side TEXT NOT NULL,
    price TEXT NOT NULL,
    size TEXT NOT NULL,
    position INTEGER,
    seq_num INTEGER,
    md_req_id TEXT,
    is_snapshot INTEGER NOT NULL,
    received_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ohlcv (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    data_type TEXT NOT NULL,
    value TEXT NOT NULL,
    entry_time TEXT,
    seq_num INTEGER,
    md_req_id TEXT,
    received_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_trades_symbol_time ON trades(symbol, received_at);
CREATE INDEX IF NOT EXISTS idx_order_book_symbol_time ON order_book(symbol, received_at);
CREATE INDEX IF NOT EXISTS idx_ohlcv_symbol_time ON ohlcv(symbol, received_at);
";

// =============================================================================
// Store
// =============================================================================

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditCounts {
    /// Issued requests.
    pub sessions: u64,
    /// Trade prints.
    pub trades: u64,
    /// Book levels.
    pub order_book: u64,
    /// Candle values.
    pub ohlcv: u64,
}

/// SQLite-backed [`AuditSink`].
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAuditStore").finish_non_exhaustive()
    }
}

impl SqliteAuditStore {
    /// Open or create the database at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Unavailable`] if the file cannot be opened or
    /// the schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(&e))?;
        }

        let conn = Connection::open(path).map_err(|e| unavailable(&e))?;
        let store = Self::init(conn)?;
        tracing::info!(path = %path.display(), "Audit store opened");
        Ok(store)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Unavailable`] if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory().map_err(|e| unavailable(&e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch(AUDIT_SCHEMA)
            .map_err(|e| unavailable(&e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Count the rows in every table.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Unavailable`] if a count query fails.
    pub fn row_counts(&self) -> Result<AuditCounts, AuditError> {
        let conn = self.conn.lock();
        let count = |table: &str| -> Result<u64, AuditError> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| u64::try_from(n).unwrap_or_default())
            .map_err(|e| unavailable(&e))
        };

        Ok(AuditCounts {
            sessions: count("sessions")?,
            trades: count("trades")?,
            order_book: count("order_book")?,
            ohlcv: count("ohlcv")?,
        })
    }

    fn insert_record(tx: &Transaction<'_>, record: &NormalizedRecord) -> rusqlite::Result<bool> {
        let received_at = record
            .received_at
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        let seq_num = parse_or_zero(&record.sequence_number);

        match &record.kind {
            EntryKind::Trade => {
                let side = record.side.as_ref().map_or("", AggressorSide::as_str);
                tx.execute(
                    "INSERT INTO trades (symbol, price, size, aggressor_side, trade_time, \
                     seq_num, md_req_id, is_snapshot, received_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        record.instrument,
                        record.price,
                        record.quantity,
                        side,
                        record.event_time,
                        seq_num,
                        record.request_id,
                        record.is_snapshot,
                        received_at,
                    ],
                )?;
            }
            EntryKind::Bid | EntryKind::Offer => {
                let side = if record.kind == EntryKind::Bid { "bid" } else { "offer" };
                let position = record.book_position.as_deref().map_or(0, parse_or_zero);
                tx.execute(
                    "INSERT INTO order_book (symbol, side, price, size, position, seq_num, \
                     md_req_id, is_snapshot, received_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        record.instrument,
                        side,
                        record.price,
                        record.quantity,
                        position,
                        seq_num,
                        record.request_id,
                        record.is_snapshot,
                        received_at,
                    ],
                )?;
            }
            kind if kind.is_candle() => {
                tx.execute(
                    "INSERT INTO ohlcv (symbol, data_type, value, entry_time, seq_num, \
                     md_req_id, received_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        record.instrument,
                        kind.name().to_lowercase(),
                        record.value(),
                        record.event_time,
                        seq_num,
                        record.request_id,
                        received_at,
                    ],
                )?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl AuditSink for SqliteAuditStore {
    fn store_batch(&self, batch: &MarketDataBatch) -> Result<usize, AuditError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(|e| AuditError::Transaction {
            message: e.to_string(),
        })?;

        let mut stored = 0;
        for record in &batch.records {
            // Dropping `tx` on the error path rolls the batch back.
            let inserted =
                Self::insert_record(&tx, record).map_err(|e| AuditError::Store {
                    kind: record.kind.name().to_string(),
                    message: e.to_string(),
                })?;
            if inserted {
                stored += 1;
            } else {
                tracing::debug!(kind = %record.kind, "Skipping unrecognized entry kind");
            }
        }

        tx.commit().map_err(|e| AuditError::Transaction {
            message: e.to_string(),
        })?;
        Ok(stored)
    }

    fn record_session(&self, session: &SessionRecord) -> Result<(), AuditError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (session_id, symbol, request_type, data_types, depth, md_req_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.session_id,
                session.instrument,
                session.request_type,
                session.data_types,
                session.depth,
                session.request_id,
            ],
        )
        .map_err(|e| AuditError::Session {
            message: e.to_string(),
        })?;
        Ok(())
    }
}

fn unavailable(error: &impl std::fmt::Display) -> AuditError {
    AuditError::Unavailable {
        message: error.to_string(),
    }
}

/// Integer columns hold 0 when the wire text does not parse.
fn parse_or_zero(text: &str) -> i64 {
    text.parse().unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================
