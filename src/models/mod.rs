//! Data models for price bars, signals, instruments, and positions.

mod bar;
mod position;
mod signal;

pub use bar::{closes, parse_klines_json, PriceBar};
pub use position::{PositionAmount, PositionInfo, SymbolInfo};
pub use signal::{Signal, TradeSide};
