use crate::alerts::AlertState;
use crate::error::Result;
use crate::models::{Alert, ForexPair, Instrument, InstrumentRef, Investment, Stock};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// Read access to the mocked market plus the manual price control.
pub trait MarketRepository: Send + Sync {
    fn list_stocks(&self) -> Result<Vec<Stock>>;
    fn list_forex_pairs(&self) -> Result<Vec<ForexPair>>;
    fn get_instrument(&self, reference: &InstrumentRef) -> Result<Option<Instrument>>;
    /// Inserts or replaces a catalogue entry.
    fn upsert_instrument(&self, instrument: &Instrument) -> Result<()>;
}

pub trait InvestmentRepository: Send + Sync {
    fn list_investments(&self, user_id: &str) -> Result<Vec<Investment>>;
    fn get_investment(&self, id: &str) -> Result<Option<Investment>>;
    fn insert_investment(&self, investment: &Investment) -> Result<()>;
    /// Overwrites a stored investment. Returns false if the id is unknown.
    fn update_investment(&self, investment: &Investment) -> Result<bool>;
    fn delete_investment(&self, id: &str) -> Result<bool>;
}

pub trait AlertRepository: Send + Sync {
    fn append_alert(&self, alert: &Alert) -> Result<()>;
    /// Alerts for the user's existing investments, newest first.
    fn list_alerts(&self, user_id: &str) -> Result<Vec<Alert>>;
    fn mark_alert_read(&self, id: &str) -> Result<bool>;
    fn alert_state(&self, investment_id: &str) -> Result<AlertState>;
    fn save_alert_state(&self, investment_id: &str, state: &AlertState) -> Result<()>;
    fn clear_alert_state(&self, investment_id: &str) -> Result<()>;
}

/// A complete storage engine.
pub trait Store: MarketRepository + InvestmentRepository + AlertRepository {}

impl<T> Store for T where T: MarketRepository + InvestmentRepository + AlertRepository {}

#[derive(Default)]
struct Tables {
    stocks: HashMap<String, Stock>,
    forex_pairs: HashMap<String, ForexPair>,
    investments: HashMap<String, Investment>,
    // Insertion order doubles as the tie-breaker for equal timestamps.
    alerts: Vec<Alert>,
    alert_states: HashMap<String, AlertState>,
}

/// Storage engine kept entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarketRepository for MemoryStore {
    fn list_stocks(&self) -> Result<Vec<Stock>> {
        let tables = self.tables.read()?;
        let mut stocks: Vec<Stock> = tables.stocks.values().cloned().collect();
        stocks.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(stocks)
    }

    fn list_forex_pairs(&self) -> Result<Vec<ForexPair>> {
        let tables = self.tables.read()?;
        let mut pairs: Vec<ForexPair> = tables.forex_pairs.values().cloned().collect();
        pairs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pairs)
    }

    fn get_instrument(&self, reference: &InstrumentRef) -> Result<Option<Instrument>> {
        let tables = self.tables.read()?;
        Ok(match reference {
            InstrumentRef::Stock { stock_id } => {
                tables.stocks.get(stock_id).cloned().map(Instrument::Stock)
            }
            InstrumentRef::Forex { forex_pair_id } => tables
                .forex_pairs
                .get(forex_pair_id)
                .cloned()
                .map(Instrument::Forex),
        })
    }

    fn upsert_instrument(&self, instrument: &Instrument) -> Result<()> {
        let mut tables = self.tables.write()?;
        match instrument {
            Instrument::Stock(stock) => {
                tables.stocks.insert(stock.id.clone(), stock.clone());
            }
            Instrument::Forex(pair) => {
                tables.forex_pairs.insert(pair.id.clone(), pair.clone());
            }
        }
        Ok(())
    }
}

impl InvestmentRepository for MemoryStore {
    fn list_investments(&self, user_id: &str) -> Result<Vec<Investment>> {
        let tables = self.tables.read()?;
        let mut investments: Vec<Investment> = tables
            .investments
            .values()
            .filter(|inv| inv.user_id == user_id)
            .cloned()
            .collect();
        investments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(investments)
    }

    fn get_investment(&self, id: &str) -> Result<Option<Investment>> {
        Ok(self.tables.read()?.investments.get(id).cloned())
    }

    fn insert_investment(&self, investment: &Investment) -> Result<()> {
        self.tables
            .write()?
            .investments
            .insert(investment.id.clone(), investment.clone());
        Ok(())
    }

    fn update_investment(&self, investment: &Investment) -> Result<bool> {
        let mut tables = self.tables.write()?;
        match tables.investments.get_mut(&investment.id) {
            Some(stored) => {
                *stored = investment.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_investment(&self, id: &str) -> Result<bool> {
        Ok(self.tables.write()?.investments.remove(id).is_some())
    }
}

impl AlertRepository for MemoryStore {
    fn append_alert(&self, alert: &Alert) -> Result<()> {
        self.tables.write()?.alerts.push(alert.clone());
        Ok(())
    }

    fn list_alerts(&self, user_id: &str) -> Result<Vec<Alert>> {
        let tables = self.tables.read()?;
        let mut alerts: Vec<Alert> = tables
            .alerts
            .iter()
            .rev()
            .filter(|alert| {
                tables
                    .investments
                    .get(&alert.investment_id)
                    .is_some_and(|inv| inv.user_id == user_id)
            })
            .cloned()
            .collect();
        // Stable, so equal timestamps keep newest-inserted first.
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    fn mark_alert_read(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write()?;
        match tables.alerts.iter_mut().find(|alert| alert.id == id) {
            Some(alert) => {
                alert.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn alert_state(&self, investment_id: &str) -> Result<AlertState> {
        Ok(self
            .tables
            .read()?
            .alert_states
            .get(investment_id)
            .copied()
            .unwrap_or_default())
    }

    fn save_alert_state(&self, investment_id: &str, state: &AlertState) -> Result<()> {
        self.tables
            .write()?
            .alert_states
            .insert(investment_id.to_string(), *state);
        Ok(())
    }

    fn clear_alert_state(&self, investment_id: &str) -> Result<()> {
        self.tables.write()?.alert_states.remove(investment_id);
        Ok(())
    }
}

/// Moves an instrument to `price`, rolling the change fields relative to the old price.
pub fn reprice(instrument: &mut Instrument, price: f64) {
    let previous = instrument.current_price();
    let change_amount = price - previous;
    let change_percent = if previous > 0.0 {
        change_amount / previous * 100.0
    } else {
        0.0
    };
    let now = Utc::now();
    match instrument {
        Instrument::Stock(stock) => {
            stock.current_price = price;
            stock.change_amount = change_amount;
            stock.change_percent = change_percent;
            stock.updated_at = now;
        }
        Instrument::Forex(pair) => {
            pair.current_rate = price;
            pair.change_amount = change_amount;
            pair.change_percent = change_percent;
            pair.updated_at = now;
        }
    }
}

/// Behavior every storage engine must share.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use crate::alerts::{creation_alert, LossBand};
    use crate::market;
    use crate::valuation::tests::investment;
    use chrono::Duration;

    fn owned_by(id: &str, user_id: &str) -> Investment {
        let mut inv = investment(100.0, 10.0, 1000.0);
        inv.id = id.to_string();
        inv.user_id = user_id.to_string();
        inv
    }

    pub(crate) fn market_lookup_and_upsert(store: &dyn Store) {
        market::seed(store).unwrap();
        assert_eq!(store.list_stocks().unwrap().len(), 5);
        assert_eq!(store.list_forex_pairs().unwrap().len(), 3);

        let tcs = InstrumentRef::Stock {
            stock_id: "TCS".into(),
        };
        let mut instrument = store.get_instrument(&tcs).unwrap().unwrap();
        assert_eq!(instrument.display_name(), "Tata Consultancy Services");

        reprice(&mut instrument, 3600.0);
        store.upsert_instrument(&instrument).unwrap();
        let stored = store.get_instrument(&tcs).unwrap().unwrap();
        assert_eq!(stored.current_price(), 3600.0);

        let missing = InstrumentRef::Forex {
            forex_pair_id: "JPYINR".into(),
        };
        assert!(store.get_instrument(&missing).unwrap().is_none());
    }

    pub(crate) fn investment_crud(store: &dyn Store) {
        let mut inv = owned_by("inv-a", "alice");
        store.insert_investment(&inv).unwrap();
        store.insert_investment(&owned_by("inv-b", "bob")).unwrap();

        let alice = store.list_investments("alice").unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0], inv);

        inv.current_price = 95.0;
        inv.stop_loss_price = Some(90.0);
        assert!(store.update_investment(&inv).unwrap());
        assert_eq!(store.get_investment("inv-a").unwrap(), Some(inv.clone()));

        let ghost = owned_by("inv-ghost", "alice");
        assert!(!store.update_investment(&ghost).unwrap());

        assert!(store.delete_investment("inv-a").unwrap());
        assert!(!store.delete_investment("inv-a").unwrap());
        assert!(store.get_investment("inv-a").unwrap().is_none());
    }

    pub(crate) fn alert_listing_is_scoped_and_ordered(store: &dyn Store) {
        let alice = owned_by("inv-a", "alice");
        let doomed = owned_by("inv-d", "alice");
        let bob = owned_by("inv-b", "bob");
        for inv in [&alice, &doomed, &bob] {
            store.insert_investment(inv).unwrap();
        }

        let mut older = creation_alert(&alice, "TCS");
        older.created_at -= Duration::seconds(60);
        let tied_first = creation_alert(&alice, "TCS");
        let mut tied_second = creation_alert(&alice, "TCS");
        tied_second.created_at = tied_first.created_at;
        for alert in [
            &older,
            &tied_first,
            &tied_second,
            &creation_alert(&doomed, "TCS"),
            &creation_alert(&bob, "TCS"),
        ] {
            store.append_alert(alert).unwrap();
        }
        store.delete_investment("inv-d").unwrap();

        let ids: Vec<String> = store
            .list_alerts("alice")
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![tied_second.id, tied_first.id, older.id.clone()]);

        assert!(store.mark_alert_read(&older.id).unwrap());
        assert!(store.mark_alert_read(&older.id).unwrap());
        assert!(!store.mark_alert_read("no-such-alert").unwrap());
        let listed = store.list_alerts("alice").unwrap();
        assert!(listed.iter().find(|a| a.id == older.id).unwrap().is_read);
        assert_eq!(listed.iter().filter(|a| a.is_read).count(), 1);
    }

    pub(crate) fn alert_state_round_trip(store: &dyn Store) {
        assert_eq!(store.alert_state("inv-a").unwrap(), AlertState::default());

        let state = AlertState {
            loss_band: LossBand::Warn10,
            stop_loss_hit: true,
            target_hit: false,
            gain_hit: false,
        };
        store.save_alert_state("inv-a", &state).unwrap();
        assert_eq!(store.alert_state("inv-a").unwrap(), state);

        let escalated = AlertState {
            loss_band: LossBand::Warn15,
            ..state
        };
        store.save_alert_state("inv-a", &escalated).unwrap();
        assert_eq!(store.alert_state("inv-a").unwrap(), escalated);

        store.clear_alert_state("inv-a").unwrap();
        assert_eq!(store.alert_state("inv-a").unwrap(), AlertState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_market_lookup_and_upsert() {
        conformance::market_lookup_and_upsert(&MemoryStore::new());
    }

    #[test]
    fn memory_investment_crud() {
        conformance::investment_crud(&MemoryStore::new());
    }

    #[test]
    fn memory_alert_listing_is_scoped_and_ordered() {
        conformance::alert_listing_is_scoped_and_ordered(&MemoryStore::new());
    }

    #[test]
    fn memory_alert_state_round_trip() {
        conformance::alert_state_round_trip(&MemoryStore::new());
    }

    #[test]
    fn repricing_rolls_change_fields() {
        let mut instrument = crate::market::seed_instruments()
            .into_iter()
            .find(|i| i.id() == "WIPRO")
            .unwrap();
        reprice(&mut instrument, 490.16);
        match instrument {
            Instrument::Stock(stock) => {
                assert_eq!(stock.current_price, 490.16);
                assert!((stock.change_amount - 44.56).abs() < 1e-9);
                assert!((stock.change_percent - 10.0).abs() < 1e-9);
            }
            Instrument::Forex(_) => panic!("WIPRO is a stock"),
        }
    }
}
