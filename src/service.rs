use crate::alerts;
use crate::error::{Error, Result};
use crate::models::{
    Alert, ForexPair, Instrument, InstrumentRef, Investment, InvestmentUpdate, NewInvestment,
    Stock, ValuatedInvestment,
};
use crate::store::{self, Store};
use crate::valuation::{ensure_positive, valuate};
use chrono::Utc;
use std::sync::{Arc, Mutex};

/// Entry point for everything the HTTP layer does with investments, alerts and prices.
#[derive(Clone)]
pub struct InvestmentService {
    store: Arc<dyn Store>,
    // Serializes revaluation passes and edits so two reads cannot admit the same alert.
    refresh: Arc<Mutex<()>>,
}

fn ensure_threshold(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) => ensure_positive(field, v),
        None => Ok(()),
    }
}

fn validate(investment: &Investment) -> Result<()> {
    ensure_positive("quantity", investment.quantity)?;
    ensure_positive("invested_amount", investment.invested_amount)?;
    ensure_positive("purchase_price", investment.purchase_price)?;
    ensure_threshold("stop_loss_price", investment.stop_loss_price)?;
    ensure_threshold("target_price", investment.target_price)?;
    if investment.invested_currency.trim().is_empty() {
        return Err(Error::InvalidInput(
            "invested_currency must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl InvestmentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            refresh: Arc::new(Mutex::new(())),
        }
    }

    /// Revalues every investment of `user_id` and records any newly triggered alerts.
    ///
    /// Investments whose instrument no longer resolves keep their stored valuation
    /// and are not evaluated.
    pub fn list_investments(&self, user_id: &str) -> Result<Vec<ValuatedInvestment>> {
        let _guard = self.refresh.lock()?;
        let investments = self.store.list_investments(user_id)?;
        let mut valuated = Vec::with_capacity(investments.len());

        for investment in investments {
            let Some(instrument) = self.store.get_instrument(&investment.instrument)? else {
                let err = Error::DanglingReference(investment.instrument.to_string());
                tracing::warn!("{} for investment {}; keeping last valuation", err, investment.id);
                valuated.push(ValuatedInvestment {
                    investment,
                    instrument: None,
                });
                continue;
            };

            let investment = match valuate(investment.clone(), instrument.current_price()) {
                Ok(valued) => valued,
                Err(err) => {
                    tracing::warn!(
                        "Skipping revaluation of investment {}: {}",
                        investment.id,
                        err
                    );
                    valuated.push(ValuatedInvestment {
                        investment,
                        instrument: Some(instrument),
                    });
                    continue;
                }
            };
            self.store.update_investment(&investment)?;

            if investment.alerts_enabled {
                self.record_alerts(&investment, instrument.display_name())?;
            }

            valuated.push(ValuatedInvestment {
                investment,
                instrument: Some(instrument),
            });
        }

        Ok(valuated)
    }

    fn record_alerts(&self, investment: &Investment, display_name: &str) -> Result<()> {
        let mut state = self.store.alert_state(&investment.id)?;
        let previous = state;
        let admitted = state.admit(alerts::evaluate(investment, display_name));

        for draft in admitted {
            let alert = draft.into_alert(&investment.id);
            tracing::info!(
                "{} alert for investment {}: {}",
                alert.alert_type,
                investment.id,
                alert.title
            );
            self.store.append_alert(&alert)?;
        }
        if state != previous {
            self.store.save_alert_state(&investment.id, &state)?;
        }
        Ok(())
    }

    /// Records a new position and its acknowledgement alert.
    pub fn create_investment(&self, user_id: &str, new: NewInvestment) -> Result<Investment> {
        let instrument = self.store.get_instrument(&new.instrument)?.ok_or_else(|| {
            Error::InvalidInput(format!("unknown {}", new.instrument))
        })?;

        let now = Utc::now();
        let investment = Investment {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            instrument: new.instrument,
            quantity: new.quantity,
            invested_amount: new.invested_amount,
            invested_currency: new.invested_currency,
            purchase_price: new.purchase_price,
            purchase_date: new.purchase_date,
            current_price: new.purchase_price,
            current_value: new.invested_amount,
            profit_loss: 0.0,
            profit_loss_percent: 0.0,
            stop_loss_price: new.stop_loss_price,
            target_price: new.target_price,
            alerts_enabled: new.alerts_enabled,
            created_at: now,
            updated_at: now,
        };
        validate(&investment)?;

        self.store.insert_investment(&investment)?;
        self.store
            .append_alert(&alerts::creation_alert(&investment, instrument.display_name()))?;
        tracing::info!(
            "Recorded investment {} in {} for {}",
            investment.id,
            investment.instrument,
            user_id
        );
        Ok(investment)
    }

    /// Applies a partial edit. Returns `None` if the investment does not exist
    /// or belongs to someone else.
    pub fn update_investment(
        &self,
        user_id: &str,
        id: &str,
        update: InvestmentUpdate,
    ) -> Result<Option<Investment>> {
        let _guard = self.refresh.lock()?;
        let Some(mut investment) = self.owned_investment(user_id, id)? else {
            return Ok(None);
        };

        let resets_alerts = update.changes_alert_config();
        if let Some(quantity) = update.quantity {
            investment.quantity = quantity;
        }
        if let Some(invested_amount) = update.invested_amount {
            investment.invested_amount = invested_amount;
        }
        if let Some(currency) = update.invested_currency {
            investment.invested_currency = currency;
        }
        if let Some(purchase_price) = update.purchase_price {
            investment.purchase_price = purchase_price;
        }
        if let Some(purchase_date) = update.purchase_date {
            investment.purchase_date = purchase_date;
        }
        if let Some(stop_loss_price) = update.stop_loss_price {
            investment.stop_loss_price = stop_loss_price;
        }
        if let Some(target_price) = update.target_price {
            investment.target_price = target_price;
        }
        if let Some(alerts_enabled) = update.alerts_enabled {
            investment.alerts_enabled = alerts_enabled;
        }
        validate(&investment)?;

        // Quantity and amount feed the derived fields, so value again at the
        // latest known price.
        let price = match self.store.get_instrument(&investment.instrument)? {
            Some(instrument) => instrument.current_price(),
            None => investment.current_price,
        };
        let mut investment = valuate(investment, price)?;
        investment.updated_at = Utc::now();

        if !self.store.update_investment(&investment)? {
            return Ok(None);
        }
        if resets_alerts {
            self.store.clear_alert_state(&investment.id)?;
        }
        Ok(Some(investment))
    }

    /// Removes an investment. Its alerts stay in the log but drop out of listings.
    pub fn delete_investment(&self, user_id: &str, id: &str) -> Result<bool> {
        let _guard = self.refresh.lock()?;
        if self.owned_investment(user_id, id)?.is_none() {
            return Ok(false);
        }
        let deleted = self.store.delete_investment(id)?;
        if deleted {
            self.store.clear_alert_state(id)?;
            tracing::info!("Deleted investment {} for {}", id, user_id);
        }
        Ok(deleted)
    }

    fn owned_investment(&self, user_id: &str, id: &str) -> Result<Option<Investment>> {
        Ok(self
            .store
            .get_investment(id)?
            .filter(|investment| investment.user_id == user_id))
    }

    pub fn list_alerts(&self, user_id: &str) -> Result<Vec<Alert>> {
        self.store.list_alerts(user_id)
    }

    /// Marks an alert as read. Returns false if no alert has this id.
    pub fn mark_alert_read(&self, alert_id: &str) -> Result<bool> {
        self.store.mark_alert_read(alert_id)
    }

    pub fn list_stocks(&self) -> Result<Vec<Stock>> {
        self.store.list_stocks()
    }

    pub fn list_forex_pairs(&self) -> Result<Vec<ForexPair>> {
        self.store.list_forex_pairs()
    }

    pub fn get_instrument(&self, reference: &InstrumentRef) -> Result<Option<Instrument>> {
        self.store.get_instrument(reference)
    }

    /// Moves a mocked market price. Returns `None` if the instrument is unknown.
    pub fn set_instrument_price(
        &self,
        reference: &InstrumentRef,
        price: f64,
    ) -> Result<Option<Instrument>> {
        if !price.is_finite() || price < 0.0 {
            return Err(Error::InvalidInput(format!(
                "price must be a non-negative number, got {}",
                price
            )));
        }
        let Some(mut instrument) = self.store.get_instrument(reference)? else {
            return Ok(None);
        };
        store::reprice(&mut instrument, price);
        self.store.upsert_instrument(&instrument)?;
        tracing::debug!("Moved {} to {}", reference, price);
        Ok(Some(instrument))
    }

    #[cfg(test)]
    fn alert_state(&self, investment_id: &str) -> Result<crate::alerts::AlertState> {
        self.store.alert_state(investment_id)
    }
}
