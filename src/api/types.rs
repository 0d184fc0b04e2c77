//! Serialized account snapshot format.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{PositionInfo, SymbolInfo};

/// Point-in-time view of an account: balance, listed symbols and positions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Available balance in quote currency
    pub balance: Decimal,

    /// Instrument metadata keyed by symbol
    #[serde(default)]
    pub symbols: HashMap<String, SymbolInfo>,

    /// Position snapshots keyed by symbol
    #[serde(default)]
    pub positions: HashMap<String, PositionInfo>,
}
