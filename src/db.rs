use crate::alerts::AlertState;
use crate::error::Result;
use crate::models::{Alert, ForexPair, Instrument, InstrumentRef, Investment, Stock};
use crate::store::{AlertRepository, InvestmentRepository, MarketRepository};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// SQLite-backed storage engine.
#[derive(Clone)]
pub struct DatabasePool(pub Arc<Mutex<rusqlite::Connection>>);

impl DatabasePool {
    /// Open (or create) the database file at `path` and make sure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(rusqlite::Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(rusqlite::Connection::open_in_memory()?)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        // Market catalogue
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stocks (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                current_price REAL NOT NULL,
                change_amount REAL NOT NULL,
                change_percent REAL NOT NULL,
                sector TEXT,
                exchange TEXT NOT NULL DEFAULT 'NSE',
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS forex_pairs (
                id TEXT PRIMARY KEY,
                base_currency TEXT NOT NULL,
                quote_currency TEXT NOT NULL,
                current_rate REAL NOT NULL,
                change_amount REAL NOT NULL,
                change_percent REAL NOT NULL,
                high_24h REAL,
                low_24h REAL,
                updated_at TEXT NOT NULL
            );",
        )?;

        // Instrument ids are not foreign keys: a position may outlive its instrument.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS investments (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                investment_type TEXT NOT NULL,
                stock_id TEXT,
                forex_pair_id TEXT,
                quantity REAL NOT NULL,
                invested_amount REAL NOT NULL,
                invested_currency TEXT NOT NULL DEFAULT 'INR',
                purchase_price REAL NOT NULL,
                purchase_date TEXT NOT NULL,
                current_price REAL NOT NULL,
                current_value REAL NOT NULL,
                profit_loss REAL NOT NULL,
                profit_loss_percent REAL NOT NULL,
                stop_loss_price REAL,
                target_price REAL,
                alerts_enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (
                    (investment_type = 'stock' AND stock_id IS NOT NULL AND forex_pair_id IS NULL)
                    OR (investment_type = 'forex' AND forex_pair_id IS NOT NULL AND stock_id IS NULL)
                )
            )",
            [],
        )?;

        // Alerts keep a weak reference to their investment
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS investment_alerts (
                id TEXT PRIMARY KEY,
                investment_id TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                severity TEXT NOT NULL DEFAULT 'warning',
                is_read INTEGER NOT NULL DEFAULT 0,
                action_required INTEGER NOT NULL DEFAULT 0,
                suggestion_type TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_investment_alerts_investment
                ON investment_alerts (investment_id);
            CREATE TABLE IF NOT EXISTS alert_states (
                investment_id TEXT PRIMARY KEY,
                loss_band TEXT NOT NULL,
                stop_loss_hit INTEGER NOT NULL,
                target_hit INTEGER NOT NULL,
                gain_hit INTEGER NOT NULL
            );",
        )?;

        Ok(Self(Arc::new(Mutex::new(conn))))
    }
}

fn parse_column<T: FromStr<Err = String>>(row: &Row, column: &str) -> rusqlite::Result<T> {
    let text: String = row.get(column)?;
    text.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, e.into()))
}

fn stock_from_row(row: &Row) -> rusqlite::Result<Stock> {
    Ok(Stock {
        id: row.get("id")?,
        symbol: row.get("symbol")?,
        name: row.get("name")?,
        current_price: row.get("current_price")?,
        change_amount: row.get("change_amount")?,
        change_percent: row.get("change_percent")?,
        sector: row.get("sector")?,
        exchange: row.get("exchange")?,
        updated_at: row.get("updated_at")?,
    })
}

fn forex_pair_from_row(row: &Row) -> rusqlite::Result<ForexPair> {
    Ok(ForexPair {
        id: row.get("id")?,
        base_currency: row.get("base_currency")?,
        quote_currency: row.get("quote_currency")?,
        current_rate: row.get("current_rate")?,
        change_amount: row.get("change_amount")?,
        change_percent: row.get("change_percent")?,
        high_24h: row.get("high_24h")?,
        low_24h: row.get("low_24h")?,
        updated_at: row.get("updated_at")?,
    })
}

fn investment_from_row(row: &Row) -> rusqlite::Result<Investment> {
    let investment_type: String = row.get("investment_type")?;
    let instrument = match investment_type.as_str() {
        "stock" => InstrumentRef::Stock {
            stock_id: row.get("stock_id")?,
        },
        "forex" => InstrumentRef::Forex {
            forex_pair_id: row.get("forex_pair_id")?,
        },
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                0,
                Type::Text,
                format!("unknown investment type '{}'", other).into(),
            ))
        }
    };

    Ok(Investment {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        instrument,
        quantity: row.get("quantity")?,
        invested_amount: row.get("invested_amount")?,
        invested_currency: row.get("invested_currency")?,
        purchase_price: row.get("purchase_price")?,
        purchase_date: row.get("purchase_date")?,
        current_price: row.get("current_price")?,
        current_value: row.get("current_value")?,
        profit_loss: row.get("profit_loss")?,
        profit_loss_percent: row.get("profit_loss_percent")?,
        stop_loss_price: row.get("stop_loss_price")?,
        target_price: row.get("target_price")?,
        alerts_enabled: row.get("alerts_enabled")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn alert_from_row(row: &Row) -> rusqlite::Result<Alert> {
    let suggestion_type = match row.get::<_, Option<String>>("suggestion_type")? {
        Some(_) => Some(parse_column(row, "suggestion_type")?),
        None => None,
    };
    Ok(Alert {
        id: row.get("id")?,
        investment_id: row.get("investment_id")?,
        alert_type: parse_column(row, "alert_type")?,
        title: row.get("title")?,
        message: row.get("message")?,
        severity: parse_column(row, "severity")?,
        is_read: row.get("is_read")?,
        action_required: row.get("action_required")?,
        suggestion_type,
        created_at: row.get("created_at")?,
    })
}

fn instrument_columns(reference: &InstrumentRef) -> (Option<&str>, Option<&str>) {
    match reference {
        InstrumentRef::Stock { stock_id } => (Some(stock_id.as_str()), None),
        InstrumentRef::Forex { forex_pair_id } => (None, Some(forex_pair_id.as_str())),
    }
}

impl MarketRepository for DatabasePool {
    fn list_stocks(&self) -> Result<Vec<Stock>> {
        let conn = self.0.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM stocks ORDER BY symbol")?;
        let stocks = stmt
            .query_map([], stock_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stocks)
    }

    fn list_forex_pairs(&self) -> Result<Vec<ForexPair>> {
        let conn = self.0.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM forex_pairs ORDER BY id")?;
        let pairs = stmt
            .query_map([], forex_pair_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
    }

    fn get_instrument(&self, reference: &InstrumentRef) -> Result<Option<Instrument>> {
        let conn = self.0.lock()?;
        let instrument = match reference {
            InstrumentRef::Stock { stock_id } => conn
                .query_row("SELECT * FROM stocks WHERE id = ?", [stock_id], stock_from_row)
                .optional()?
                .map(Instrument::Stock),
            InstrumentRef::Forex { forex_pair_id } => conn
                .query_row(
                    "SELECT * FROM forex_pairs WHERE id = ?",
                    [forex_pair_id],
                    forex_pair_from_row,
                )
                .optional()?
                .map(Instrument::Forex),
        };
        Ok(instrument)
    }

    fn upsert_instrument(&self, instrument: &Instrument) -> Result<()> {
        let conn = self.0.lock()?;
        match instrument {
            Instrument::Stock(stock) => conn.execute(
                "INSERT OR REPLACE INTO stocks
                    (id, symbol, name, current_price, change_amount, change_percent, sector, exchange, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    stock.id,
                    stock.symbol,
                    stock.name,
                    stock.current_price,
                    stock.change_amount,
                    stock.change_percent,
                    stock.sector,
                    stock.exchange,
                    stock.updated_at,
                ],
            )?,
            Instrument::Forex(pair) => conn.execute(
                "INSERT OR REPLACE INTO forex_pairs
                    (id, base_currency, quote_currency, current_rate, change_amount, change_percent, high_24h, low_24h, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    pair.id,
                    pair.base_currency,
                    pair.quote_currency,
                    pair.current_rate,
                    pair.change_amount,
                    pair.change_percent,
                    pair.high_24h,
                    pair.low_24h,
                    pair.updated_at,
                ],
            )?,
        };
        Ok(())
    }
}

impl InvestmentRepository for DatabasePool {
    fn list_investments(&self, user_id: &str) -> Result<Vec<Investment>> {
        let conn = self.0.lock()?;
        let mut stmt =
            conn.prepare("SELECT * FROM investments WHERE user_id = ? ORDER BY created_at, rowid")?;
        let investments = stmt
            .query_map([user_id], investment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(investments)
    }

    fn get_investment(&self, id: &str) -> Result<Option<Investment>> {
        let conn = self.0.lock()?;
        let investment = conn
            .query_row("SELECT * FROM investments WHERE id = ?", [id], investment_from_row)
            .optional()?;
        Ok(investment)
    }

    fn insert_investment(&self, inv: &Investment) -> Result<()> {
        let conn = self.0.lock()?;
        let (stock_id, forex_pair_id) = instrument_columns(&inv.instrument);
        conn.execute(
            "INSERT INTO investments (
                id, user_id, investment_type, stock_id, forex_pair_id,
                quantity, invested_amount, invested_currency, purchase_price, purchase_date,
                current_price, current_value, profit_loss, profit_loss_percent,
                stop_loss_price, target_price, alerts_enabled, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                inv.id,
                inv.user_id,
                inv.instrument.kind(),
                stock_id,
                forex_pair_id,
                inv.quantity,
                inv.invested_amount,
                inv.invested_currency,
                inv.purchase_price,
                inv.purchase_date,
                inv.current_price,
                inv.current_value,
                inv.profit_loss,
                inv.profit_loss_percent,
                inv.stop_loss_price,
                inv.target_price,
                inv.alerts_enabled,
                inv.created_at,
                inv.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update_investment(&self, inv: &Investment) -> Result<bool> {
        let conn = self.0.lock()?;
        let updated = conn.execute(
            "UPDATE investments SET
                quantity = ?, invested_amount = ?, invested_currency = ?,
                purchase_price = ?, purchase_date = ?,
                current_price = ?, current_value = ?, profit_loss = ?, profit_loss_percent = ?,
                stop_loss_price = ?, target_price = ?, alerts_enabled = ?, updated_at = ?
             WHERE id = ?",
            params![
                inv.quantity,
                inv.invested_amount,
                inv.invested_currency,
                inv.purchase_price,
                inv.purchase_date,
                inv.current_price,
                inv.current_value,
                inv.profit_loss,
                inv.profit_loss_percent,
                inv.stop_loss_price,
                inv.target_price,
                inv.alerts_enabled,
                inv.updated_at,
                inv.id,
            ],
        )?;
        Ok(updated > 0)
    }

    fn delete_investment(&self, id: &str) -> Result<bool> {
        let conn = self.0.lock()?;
        let deleted = conn.execute("DELETE FROM investments WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }
}

impl AlertRepository for DatabasePool {
    fn append_alert(&self, alert: &Alert) -> Result<()> {
        let conn = self.0.lock()?;
        conn.execute(
            "INSERT INTO investment_alerts
                (id, investment_id, alert_type, title, message, severity, is_read, action_required, suggestion_type, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                alert.id,
                alert.investment_id,
                alert.alert_type.as_str(),
                alert.title,
                alert.message,
                alert.severity.as_str(),
                alert.is_read,
                alert.action_required,
                alert.suggestion_type.map(|s| s.as_str()),
                alert.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_alerts(&self, user_id: &str) -> Result<Vec<Alert>> {
        let conn = self.0.lock()?;
        // The join drops alerts whose investment has been deleted
        let mut stmt = conn.prepare(
            "SELECT a.* FROM investment_alerts a
             JOIN investments i ON i.id = a.investment_id
             WHERE i.user_id = ?
             ORDER BY a.created_at DESC, a.rowid DESC",
        )?;
        let alerts = stmt
            .query_map([user_id], alert_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(alerts)
    }

    fn mark_alert_read(&self, id: &str) -> Result<bool> {
        let conn = self.0.lock()?;
        let updated = conn.execute("UPDATE investment_alerts SET is_read = 1 WHERE id = ?", [id])?;
        Ok(updated > 0)
    }

    fn alert_state(&self, investment_id: &str) -> Result<AlertState> {
        let conn = self.0.lock()?;
        let state = conn
            .query_row(
                "SELECT loss_band, stop_loss_hit, target_hit, gain_hit
                 FROM alert_states WHERE investment_id = ?",
                [investment_id],
                |row| {
                    Ok(AlertState {
                        loss_band: parse_column(row, "loss_band")?,
                        stop_loss_hit: row.get("stop_loss_hit")?,
                        target_hit: row.get("target_hit")?,
                        gain_hit: row.get("gain_hit")?,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_default())
    }

    fn save_alert_state(&self, investment_id: &str, state: &AlertState) -> Result<()> {
        let conn = self.0.lock()?;
        conn.execute(
            "INSERT INTO alert_states (investment_id, loss_band, stop_loss_hit, target_hit, gain_hit)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(investment_id)
             DO UPDATE SET
                 loss_band = excluded.loss_band,
                 stop_loss_hit = excluded.stop_loss_hit,
                 target_hit = excluded.target_hit,
                 gain_hit = excluded.gain_hit",
            params![
                investment_id,
                state.loss_band.as_str(),
                state.stop_loss_hit,
                state.target_hit,
                state.gain_hit,
            ],
        )?;
        Ok(())
    }

    fn clear_alert_state(&self, investment_id: &str) -> Result<()> {
        let conn = self.0.lock()?;
        conn.execute("DELETE FROM alert_states WHERE investment_id = ?", [investment_id])?;
        Ok(())
    }
}
