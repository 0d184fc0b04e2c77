//! Exchange collaborator interface and a file-backed implementation.

mod snapshot_client;
mod types;

use anyhow::Result;
use rust_decimal::Decimal;

use crate::models::{PositionAmount, PositionInfo, SymbolInfo};

pub use snapshot_client::SnapshotClient;
pub use types::AccountSnapshot;

/// Read-only account and instrument queries the risk engine depends on.
///
/// Calls are blocking; timeouts and retries belong to the implementor.
pub trait ExchangeClient {
    /// Available balance in quote currency.
    fn get_account_balance(&self) -> Result<Decimal>;

    /// Precision and limits for a symbol, `None` if the exchange doesn't list it.
    fn get_symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>>;

    /// Position snapshot for a symbol, `None` if the exchange reports nothing.
    fn get_position_info(&self, symbol: &str) -> Result<Option<PositionInfo>>;

    /// Signed position amounts for every symbol on the account.
    fn get_position_amounts(&self) -> Result<Vec<PositionAmount>>;
}

impl<T: ExchangeClient + ?Sized> ExchangeClient for &T {
    fn get_account_balance(&self) -> Result<Decimal> {
        (**self).get_account_balance()
    }

    fn get_symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>> {
        (**self).get_symbol_info(symbol)
    }

    fn get_position_info(&self, symbol: &str) -> Result<Option<PositionInfo>> {
        (**self).get_position_info(symbol)
    }

    fn get_position_amounts(&self) -> Result<Vec<PositionAmount>> {
        (**self).get_position_amounts()
    }
}
