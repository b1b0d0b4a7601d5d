use crate::error::{Error, Result};
use crate::models::Investment;

/// Re-prices an investment at `instrument_price`.
///
/// Returns the investment with its current price, value and profit/loss
/// recomputed. Quantity and invested amount must be positive; a zero
/// invested amount would otherwise leak NaN or infinity into the percentage.
pub fn valuate(mut investment: Investment, instrument_price: f64) -> Result<Investment> {
    if !instrument_price.is_finite() || instrument_price < 0.0 {
        return Err(Error::InvalidInput(format!(
            "price {} for {} must be a non-negative number",
            instrument_price, investment.instrument
        )));
    }
    ensure_positive("quantity", investment.quantity)?;
    ensure_positive("invested_amount", investment.invested_amount)?;

    let current_value = instrument_price * investment.quantity;
    let profit_loss = current_value - investment.invested_amount;

    investment.current_price = instrument_price;
    investment.current_value = current_value;
    investment.profit_loss = profit_loss;
    investment.profit_loss_percent = profit_loss / investment.invested_amount * 100.0;
    Ok(investment)
}

/// Rejects zero, negative, NaN and infinite values for a required field.
pub fn ensure_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{} must be a positive number, got {}",
            field, value
        )))
    }
}
