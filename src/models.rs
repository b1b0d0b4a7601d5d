use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A listed equity from the mocked market catalogue.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Stock {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub change_amount: f64,
    pub change_percent: f64,
    pub sector: Option<String>,
    pub exchange: String,
    pub updated_at: DateTime<Utc>,
}

/// A currency pair quoted as units of `quote_currency` per `base_currency`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ForexPair {
    pub id: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub current_rate: f64,
    pub change_amount: f64,
    pub change_percent: f64,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Anything an investment can be held in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrument {
    Stock(Stock),
    Forex(ForexPair),
}

impl Instrument {
    pub fn id(&self) -> &str {
        match self {
            Instrument::Stock(stock) => &stock.id,
            Instrument::Forex(pair) => &pair.id,
        }
    }

    /// Label used when addressing the user about this instrument.
    pub fn display_name(&self) -> &str {
        match self {
            Instrument::Stock(stock) => &stock.name,
            Instrument::Forex(pair) => &pair.base_currency,
        }
    }

    pub fn current_price(&self) -> f64 {
        match self {
            Instrument::Stock(stock) => stock.current_price,
            Instrument::Forex(pair) => pair.current_rate,
        }
    }

    pub fn reference(&self) -> InstrumentRef {
        match self {
            Instrument::Stock(stock) => InstrumentRef::Stock {
                stock_id: stock.id.clone(),
            },
            Instrument::Forex(pair) => InstrumentRef::Forex {
                forex_pair_id: pair.id.clone(),
            },
        }
    }
}

/// Which instrument an investment points at.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "investment_type", rename_all = "snake_case")]
pub enum InstrumentRef {
    Stock { stock_id: String },
    Forex { forex_pair_id: String },
}

impl InstrumentRef {
    pub fn kind(&self) -> &'static str {
        match self {
            InstrumentRef::Stock { .. } => "stock",
            InstrumentRef::Forex { .. } => "forex",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            InstrumentRef::Stock { stock_id } => stock_id,
            InstrumentRef::Forex { forex_pair_id } => forex_pair_id,
        }
    }
}

impl fmt::Display for InstrumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

/// A user's position in one instrument.
///
/// The `current_*` and `profit_loss*` fields are a cache of the last
/// valuation and are recomputed on every read of the investment list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Investment {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub instrument: InstrumentRef,

    pub quantity: f64,
    pub invested_amount: f64,
    pub invested_currency: String,
    pub purchase_price: f64,
    pub purchase_date: DateTime<Utc>,

    pub current_price: f64,
    pub current_value: f64,
    pub profit_loss: f64,
    pub profit_loss_percent: f64,

    pub stop_loss_price: Option<f64>,
    pub target_price: Option<f64>,
    pub alerts_enabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An investment together with the instrument it resolved to on this read.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ValuatedInvestment {
    #[serde(flatten)]
    pub investment: Investment,
    pub instrument: Option<Instrument>,
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_true() -> bool {
    true
}

/// Request body for recording a new investment.
#[derive(Deserialize, Debug, Clone)]
pub struct NewInvestment {
    #[serde(flatten)]
    pub instrument: InstrumentRef,
    pub quantity: f64,
    pub invested_amount: f64,
    #[serde(default = "default_currency")]
    pub invested_currency: String,
    pub purchase_price: f64,
    #[serde(default = "Utc::now")]
    pub purchase_date: DateTime<Utc>,
    #[serde(default)]
    pub stop_loss_price: Option<f64>,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default = "default_true")]
    pub alerts_enabled: bool,
}

// Distinguishes an absent field (None) from an explicit null (Some(None)).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial edit of an investment. Valuation fields and the instrument are not editable.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct InvestmentUpdate {
    pub quantity: Option<f64>,
    pub invested_amount: Option<f64>,
    pub invested_currency: Option<String>,
    pub purchase_price: Option<f64>,
    pub purchase_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub stop_loss_price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub target_price: Option<Option<f64>>,
    pub alerts_enabled: Option<bool>,
}

impl InvestmentUpdate {
    /// Whether applying this update touches the alert configuration.
    pub fn changes_alert_config(&self) -> bool {
        self.stop_loss_price.is_some() || self.target_price.is_some() || self.alerts_enabled.is_some()
    }
}

/// Request body for moving a mocked market price.
#[derive(Serialize, Deserialize, Debug)]
pub struct PriceUpdate {
    pub price: f64,
}

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(AlertKind {
    StopLoss => "stop_loss",
    TargetReached => "target_reached",
    LossWarning => "loss_warning",
    Suggestion => "suggestion",
});

text_enum!(Severity {
    Info => "info",
    Warning => "warning",
    Danger => "danger",
    Success => "success",
});

text_enum!(Suggestion {
    Sell => "sell",
    Hold => "hold",
    BuyMore => "buy_more",
    SetStopLoss => "set_stop_loss",
});

/// An advisory event tied to one investment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: String,
    pub investment_id: String,
    pub alert_type: AlertKind,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub is_read: bool,
    pub action_required: bool,
    pub suggestion_type: Option<Suggestion>,
    pub created_at: DateTime<Utc>,
}
