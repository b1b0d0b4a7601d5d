//! Loss-prevention alert rules.
//!
//! [`evaluate`] runs the threshold battery against a freshly valued
//! investment. Its output is stateless, so callers pass it through the
//! investment's [`AlertState`] to keep only alerts whose band was just
//! entered.

use crate::models::{Alert, AlertKind, Investment, Severity, Suggestion};
use chrono::Utc;
use std::fmt;
use std::str::FromStr;

/// Disjoint profit/loss-percent ranges used to grade loss warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LossBand {
    #[default]
    None,
    Warn5,
    Warn10,
    Warn15,
}

impl LossBand {
    pub fn for_percent(profit_loss_percent: f64) -> LossBand {
        if profit_loss_percent <= -15.0 {
            LossBand::Warn15
        } else if profit_loss_percent <= -10.0 {
            LossBand::Warn10
        } else if profit_loss_percent <= -5.0 {
            LossBand::Warn5
        } else {
            LossBand::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LossBand::None => "none",
            LossBand::Warn5 => "warn5",
            LossBand::Warn10 => "warn10",
            LossBand::Warn15 => "warn15",
        }
    }
}

impl FromStr for LossBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(LossBand::None),
            "warn5" => Ok(LossBand::Warn5),
            "warn10" => Ok(LossBand::Warn10),
            "warn15" => Ok(LossBand::Warn15),
            other => Err(format!("unknown loss band '{}'", other)),
        }
    }
}

impl fmt::Display for LossBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The condition an alert was raised for. Used as the deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdBand {
    StopLoss,
    Target,
    Loss(LossBand),
    Gain,
}

/// An alert produced by a rule, not yet admitted or stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub band: ThresholdBand,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub action_required: bool,
    pub suggestion: Option<Suggestion>,
}

impl AlertDraft {
    pub fn into_alert(self, investment_id: &str) -> Alert {
        new_alert(
            investment_id,
            self.kind,
            self.title,
            self.message,
            self.severity,
            self.action_required,
            self.suggestion,
        )
    }
}

fn new_alert(
    investment_id: &str,
    kind: AlertKind,
    title: String,
    message: String,
    severity: Severity,
    action_required: bool,
    suggestion: Option<Suggestion>,
) -> Alert {
    Alert {
        id: uuid::Uuid::new_v4().to_string(),
        investment_id: investment_id.to_string(),
        alert_type: kind,
        title,
        message,
        severity,
        is_read: false,
        action_required,
        suggestion_type: suggestion,
        created_at: Utc::now(),
    }
}

/// The one-off acknowledgement recorded when an investment is created.
pub fn creation_alert(investment: &Investment, display_name: &str) -> Alert {
    new_alert(
        &investment.id,
        AlertKind::Suggestion,
        "Investment Added Successfully".to_string(),
        format!(
            "Your investment in {} has been recorded. We'll monitor it for you.",
            display_name
        ),
        Severity::Success,
        false,
        Some(Suggestion::Hold),
    )
}

/// Runs the threshold battery against a valued investment.
///
/// Stop-loss, target and gain rules are independent of each other and of the
/// loss bands; at most one loss band matches.
pub fn evaluate(investment: &Investment, display_name: &str) -> Vec<AlertDraft> {
    let mut drafts = Vec::new();
    if !investment.alerts_enabled {
        return drafts;
    }

    let price = investment.current_price;
    let percent = investment.profit_loss_percent;

    if let Some(stop_loss) = investment.stop_loss_price {
        if price <= stop_loss {
            drafts.push(AlertDraft {
                band: ThresholdBand::StopLoss,
                kind: AlertKind::StopLoss,
                title: "Stop Loss Triggered".to_string(),
                message: format!(
                    "{} has reached your stop loss price of {}. Consider selling to prevent further losses.",
                    display_name, stop_loss
                ),
                severity: Severity::Danger,
                action_required: true,
                suggestion: Some(Suggestion::Sell),
            });
        }
    }

    if let Some(target) = investment.target_price {
        if price >= target {
            drafts.push(AlertDraft {
                band: ThresholdBand::Target,
                kind: AlertKind::TargetReached,
                title: "Target Price Reached".to_string(),
                message: format!(
                    "{} has reached your target price of {}. Consider taking profits.",
                    display_name, target
                ),
                severity: Severity::Success,
                action_required: true,
                suggestion: Some(Suggestion::Sell),
            });
        }
    }

    let band = LossBand::for_percent(percent);
    let loss = percent.abs();
    let loss_warning = match band {
        LossBand::None => None,
        LossBand::Warn5 => Some((
            "Investment Down 5%",
            "Consider reviewing your position.",
            Severity::Warning,
            false,
            Suggestion::Hold,
        )),
        LossBand::Warn10 => Some((
            "Significant Loss Alert",
            "Consider setting a stop loss or reducing position.",
            Severity::Danger,
            true,
            Suggestion::SetStopLoss,
        )),
        LossBand::Warn15 => Some((
            "Major Loss Alert",
            "Immediate action recommended to prevent further losses.",
            Severity::Danger,
            true,
            Suggestion::Sell,
        )),
    };
    if let Some((title, advice, severity, action_required, suggestion)) = loss_warning {
        drafts.push(AlertDraft {
            band: ThresholdBand::Loss(band),
            kind: AlertKind::LossWarning,
            title: title.to_string(),
            message: format!(
                "Your investment in {} is down {:.1}%. {}",
                display_name, loss, advice
            ),
            severity,
            action_required,
            suggestion: Some(suggestion),
        });
    }

    if percent >= 10.0 {
        drafts.push(AlertDraft {
            band: ThresholdBand::Gain,
            kind: AlertKind::Suggestion,
            title: "Great Performance!".to_string(),
            message: format!(
                "Your investment in {} is up {:.1}%. Consider taking some profits or setting a trailing stop.",
                display_name, percent
            ),
            severity: Severity::Success,
            action_required: false,
            suggestion: Some(Suggestion::Hold),
        });
    }

    drafts
}

/// What the last evaluation of an investment observed.
///
/// Stop-loss, target and gain conditions are latched: they alert once when
/// they become true and re-arm when they clear. `loss_band` is the deepest
/// band reached since the position was last out of loss, so a loss warning
/// fires only when that mark deepens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertState {
    pub loss_band: LossBand,
    pub stop_loss_hit: bool,
    pub target_hit: bool,
    pub gain_hit: bool,
}

impl AlertState {
    /// Moves to the state observed by `drafts` and returns the drafts that
    /// represent a newly entered band.
    pub fn admit(&mut self, drafts: Vec<AlertDraft>) -> Vec<AlertDraft> {
        let mut next = AlertState::default();
        for draft in &drafts {
            match draft.band {
                ThresholdBand::StopLoss => next.stop_loss_hit = true,
                ThresholdBand::Target => next.target_hit = true,
                ThresholdBand::Loss(band) => next.loss_band = band,
                ThresholdBand::Gain => next.gain_hit = true,
            }
        }

        // Hold the deepest band until the loss clears completely.
        if next.loss_band != LossBand::None {
            next.loss_band = next.loss_band.max(self.loss_band);
        }

        let previous = std::mem::replace(self, next);
        drafts
            .into_iter()
            .filter(|draft| match draft.band {
                ThresholdBand::StopLoss => !previous.stop_loss_hit,
                ThresholdBand::Target => !previous.target_hit,
                ThresholdBand::Loss(band) => band > previous.loss_band,
                ThresholdBand::Gain => !previous.gain_hit,
            })
            .collect()
    }
}
