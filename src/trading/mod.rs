//! Trading logic: risk management, signal strategies, configuration.

mod config;
mod risk_manager;
mod strategy;

pub use config::{RiskConfig, Settings, StrategyConfig};
pub use risk_manager::RiskManager;
pub use strategy::{get_strategy, Strategy, StrategyKind};
