//! Bot runner: one planning cycle from price bars to order parameters.
//!
//! Runs the strategy, checks the open-position gate, sizes the position and
//! attaches protective levels. The result is a plan; nothing is submitted.

use std::fmt;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::ExchangeClient;
use crate::models::{PriceBar, TradeSide};
use crate::trading::{RiskManager, Strategy};

/// Order parameters for a new position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradePlan {
    pub symbol: String,
    pub side: TradeSide,
    /// Close of the latest bar
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Strategy that produced the signal
    pub strategy: String,
}

/// Outcome of a planning cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanDecision {
    /// All checks passed
    Planned(TradePlan),
    /// Strategy reported no signal
    NoSignal,
    /// Existing position or open-position limit
    Blocked,
    /// Latest close can't be used as an entry price
    InvalidPrice,
    /// Risk manager sized the position to zero
    ZeroSize,
}

impl fmt::Display for PlanDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanDecision::Planned(plan) => write!(
                f,
                "{} {} {} @ {} via {}",
                plan.side, plan.quantity, plan.symbol, plan.entry_price, plan.strategy
            ),
            PlanDecision::NoSignal => write!(f, "no signal"),
            PlanDecision::Blocked => write!(f, "position gate closed"),
            PlanDecision::InvalidPrice => write!(f, "invalid entry price"),
            PlanDecision::ZeroSize => write!(f, "position size is zero"),
        }
    }
}

/// Strategy plus risk manager over one exchange collaborator.
pub struct Bot<E: ExchangeClient> {
    risk: RiskManager<E>,
    strategy: Box<dyn Strategy>,
}

impl<E: ExchangeClient> Bot<E> {
    pub fn new(risk: RiskManager<E>, strategy: Box<dyn Strategy>) -> Self {
        Self { risk, strategy }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Run one planning cycle for `symbol` over `bars` (oldest first).
    pub fn evaluate(&mut self, symbol: &str, bars: &[PriceBar]) -> PlanDecision {
        self.risk.update_balance_for_compounding();

        let signal = self.strategy.get_signal(bars);
        let Some(side) = signal.side() else {
            debug!(symbol = %symbol, strategy = %self.strategy.name(), "No signal");
            return PlanDecision::NoSignal;
        };

        if !self.risk.should_open_position(symbol) {
            return PlanDecision::Blocked;
        }

        let entry_price = match bars.last().and_then(|bar| Decimal::from_f64(bar.close)) {
            Some(price) if price > Decimal::ZERO => price,
            _ => {
                warn!(symbol = %symbol, "Latest close is not a usable entry price");
                return PlanDecision::InvalidPrice;
            }
        };

        let stop_loss = self.risk.calculate_stop_loss(symbol, side, entry_price);
        let quantity = self
            .risk
            .calculate_position_size(symbol, side, entry_price, stop_loss);
        if quantity.is_zero() {
            return PlanDecision::ZeroSize;
        }

        let take_profit = self.risk.calculate_take_profit(symbol, side, entry_price);

        let plan = TradePlan {
            symbol: symbol.to_string(),
            side,
            entry_price,
            quantity,
            stop_loss,
            take_profit,
            strategy: self.strategy.name().to_string(),
        };

        info!(
            symbol = %plan.symbol,
            side = %plan.side,
            quantity = %plan.quantity,
            entry = %plan.entry_price,
            strategy = %plan.strategy,
            "Trade planned"
        );

        PlanDecision::Planned(plan)
    }
}
