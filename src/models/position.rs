//! Exchange-reported instrument metadata and open position snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Precision and limits for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Decimal places accepted for order quantity
    pub quantity_precision: u32,

    /// Minimum order quantity, also used as the quantity step size
    pub min_qty: Decimal,

    /// Minimum order value (quantity x price) in quote currency
    pub min_notional: Decimal,

    /// Decimal places accepted for order prices
    pub price_precision: u32,
}

/// Open position snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    /// Signed position size: positive for longs, negative for shorts
    pub position_amount: Decimal,

    /// Average entry price
    #[serde(default)]
    pub entry_price: Decimal,

    /// Leverage configured on the exchange for this symbol
    #[serde(default = "default_leverage")]
    pub leverage: u32,
}

fn default_leverage() -> u32 {
    1
}

impl PositionInfo {
    /// Check if this position is open (non-zero size).
    pub fn is_open(&self) -> bool {
        !self.position_amount.is_zero()
    }
}

/// One entry of the account-wide position listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionAmount {
    pub symbol: String,
    pub position_amount: Decimal,
}

impl PositionAmount {
    pub fn is_open(&self) -> bool {
        !self.position_amount.is_zero()
    }
}
