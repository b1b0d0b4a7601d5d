use crate::error::Result;
use crate::models::{ForexPair, Instrument, Stock};
use crate::store::MarketRepository;
use chrono::Utc;

fn stock(id: &str, name: &str, price: f64, change: f64, change_percent: f64, sector: &str) -> Instrument {
    Instrument::Stock(Stock {
        id: id.to_string(),
        symbol: id.to_string(),
        name: name.to_string(),
        current_price: price,
        change_amount: change,
        change_percent,
        sector: Some(sector.to_string()),
        exchange: "NSE".to_string(),
        updated_at: Utc::now(),
    })
}

fn pair(base: &str, quote: &str, rate: f64, change: f64, change_percent: f64, high: f64, low: f64) -> Instrument {
    Instrument::Forex(ForexPair {
        id: format!("{}{}", base, quote),
        base_currency: base.to_string(),
        quote_currency: quote.to_string(),
        current_rate: rate,
        change_amount: change,
        change_percent,
        high_24h: Some(high),
        low_24h: Some(low),
        updated_at: Utc::now(),
    })
}

/// The mocked market the app starts with.
pub fn seed_instruments() -> Vec<Instrument> {
    vec![
        stock("TCS", "Tata Consultancy Services", 3542.80, 72.45, 2.1, "IT Services"),
        stock("RIL", "Reliance Industries", 2876.45, -23.10, -0.8, "Oil & Gas"),
        stock("HDFCBANK", "HDFC Bank", 1645.20, -25.15, -1.5, "Banking"),
        stock("INFY", "Infosys", 1456.75, 28.30, 1.98, "IT Services"),
        stock("WIPRO", "Wipro", 445.60, -8.20, -1.81, "IT Services"),
        pair("USD", "INR", 83.25, 0.15, 0.18, 83.45, 82.95),
        pair("EUR", "USD", 1.0892, -0.0023, -0.21, 1.0925, 1.0875),
        pair("GBP", "INR", 105.67, 0.89, 0.85, 106.12, 104.88),
    ]
}

/// Inserts any seed instrument the store does not know yet. Existing prices are kept.
pub fn seed<S: MarketRepository + ?Sized>(store: &S) -> Result<usize> {
    let mut inserted = 0;
    for instrument in seed_instruments() {
        if store.get_instrument(&instrument.reference())?.is_none() {
            store.upsert_instrument(&instrument)?;
            inserted += 1;
        }
    }
    tracing::debug!("Seeded {} market instruments", inserted);
    Ok(inserted)
}
