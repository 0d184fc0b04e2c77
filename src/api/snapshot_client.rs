//! Exchange client that answers queries from a static account snapshot.
//!
//! Used for dry runs and offline planning: load a JSON snapshot exported from
//! the exchange and evaluate strategies and sizing against it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{PositionAmount, PositionInfo, SymbolInfo};

use super::{AccountSnapshot, ExchangeClient};

/// File-backed exchange client.
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    snapshot: AccountSnapshot,
}

impl SnapshotClient {
    /// Create a client from an in-memory snapshot.
    pub fn new(snapshot: AccountSnapshot) -> Self {
        Self { snapshot }
    }

    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: AccountSnapshot =
            serde_json::from_str(json).context("Failed to parse account snapshot")?;
        Ok(Self::new(snapshot))
    }

    /// Load a snapshot from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let client = Self::from_json(&json)?;

        debug!(
            path = %path.display(),
            symbols = client.snapshot.symbols.len(),
            positions = client.snapshot.positions.len(),
            "Loaded account snapshot"
        );
        Ok(client)
    }
}

impl ExchangeClient for SnapshotClient {
    fn get_account_balance(&self) -> Result<Decimal> {
        Ok(self.snapshot.balance)
    }

    fn get_symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>> {
        Ok(self.snapshot.symbols.get(symbol).cloned())
    }

    fn get_position_info(&self, symbol: &str) -> Result<Option<PositionInfo>> {
        Ok(self.snapshot.positions.get(symbol).cloned())
    }

    fn get_position_amounts(&self) -> Result<Vec<PositionAmount>> {
        let mut amounts: Vec<PositionAmount> = self
            .snapshot
            .positions
            .iter()
            .map(|(symbol, info)| PositionAmount {
                symbol: symbol.clone(),
                position_amount: info.position_amount,
            })
            .collect();
        amounts.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(amounts)
    }
}
