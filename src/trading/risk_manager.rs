//! Risk manager: position sizing, protective levels and open-position gating.
//!
//! Nothing here returns an error. Unavailable exchange data or unusable risk
//! parameters are logged and reported as a zero quantity, `None` or `false`,
//! which callers must treat as "do not trade".

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use tracing::{debug, error, info, warn};

use crate::api::ExchangeClient;
use crate::models::{PositionInfo, SymbolInfo, TradeSide};

use super::RiskConfig;

/// Smallest entry-to-stop distance accepted for risk-based sizing.
const MIN_STOP_DISTANCE: Decimal = dec!(0.00000001);

/// Balance trackers for compounding. Both fields are always set together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSnapshot {
    /// Balance seen on the first observation
    pub initial: Decimal,
    /// Balance at the last observed increase
    pub last_known: Decimal,
}

impl BalanceSnapshot {
    fn new(balance: Decimal) -> Self {
        Self {
            initial: balance,
            last_known: balance,
        }
    }
}

/// Converts risk settings and live account state into order parameters.
pub struct RiskManager<E: ExchangeClient> {
    exchange: E,
    config: RiskConfig,
    balances: Option<BalanceSnapshot>,
}

impl<E: ExchangeClient> RiskManager<E> {
    pub fn new(exchange: E, config: RiskConfig) -> Self {
        Self {
            exchange,
            config,
            balances: None,
        }
    }

    /// Growth of the last known balance over the initial one, as a fraction.
    pub fn equity_growth(&self) -> Option<Decimal> {
        let snapshot = self.balances?;
        if snapshot.initial <= Decimal::ZERO {
            return None;
        }
        Some((snapshot.last_known - snapshot.initial) / snapshot.initial)
    }

    // ==================== Position Sizing ====================

    /// Calculate the order quantity for a new position.
    ///
    /// With a stop loss (and the stop-loss feature enabled) the size is chosen
    /// so that hitting the stop loses `risk_per_trade` of the balance. Without
    /// one, `risk_per_trade` of the balance times leverage is committed as
    /// notional. The result is floored to the symbol's step size and raised to
    /// the minimum notional only when that stays within the risk budget.
    ///
    /// Returns zero when no position should be opened.
    pub fn calculate_position_size(
        &mut self,
        symbol: &str,
        side: TradeSide,
        price: Decimal,
        stop_loss_price: Option<Decimal>,
    ) -> Decimal {
        let balance = match self.exchange.get_account_balance() {
            Ok(balance) => balance,
            Err(e) => {
                error!(error = %e, "Could not retrieve account balance");
                return Decimal::ZERO;
            }
        };

        let snapshot = *self.balances.get_or_insert(BalanceSnapshot::new(balance));

        if self.config.auto_compound {
            let profit = balance - snapshot.last_known;
            if profit > Decimal::ZERO {
                info!(profit = %profit.round_dp(2), "Auto-compounding profit");
                self.balances = Some(BalanceSnapshot {
                    last_known: balance,
                    ..snapshot
                });
            }
        }

        if balance <= Decimal::ZERO {
            error!(balance = %balance, "Insufficient balance to open a position");
            return Decimal::ZERO;
        }

        if price <= Decimal::ZERO {
            error!(symbol = %symbol, price = %price, "Invalid entry price");
            return Decimal::ZERO;
        }

        let Some(info) = self.symbol_info(symbol) else {
            error!(symbol = %symbol, "Could not retrieve symbol info");
            return Decimal::ZERO;
        };

        let risk_amount = balance * self.config.risk_per_trade;

        let stop = stop_loss_price.filter(|stop| self.config.use_stop_loss && *stop > Decimal::ZERO);
        let max_quantity = match stop {
            Some(stop) => {
                let risk_per_unit = (price - stop).abs();
                if risk_per_unit <= MIN_STOP_DISTANCE {
                    error!(
                        symbol = %symbol,
                        price = %price,
                        stop_loss = %stop,
                        "Stop loss too close to entry price"
                    );
                    return Decimal::ZERO;
                }
                risk_amount.checked_div(risk_per_unit)
            }
            None => {
                let leverage = Decimal::from(self.get_current_leverage(symbol));
                risk_amount
                    .checked_mul(leverage)
                    .and_then(|notional| notional.checked_div(price))
            }
        };

        let Some(max_quantity) = max_quantity else {
            error!(symbol = %symbol, "Position size out of range");
            return Decimal::ZERO;
        };

        let mut quantity = round_step_size(max_quantity, info.min_qty);

        if quantity * price < info.min_notional {
            warn!(
                symbol = %symbol,
                quantity = %quantity,
                min_notional = %info.min_notional,
                "Position size too small, below minimum notional"
            );

            let required = info
                .min_notional
                .checked_div(price)
                .and_then(|qty| ceil_step_size(qty, info.min_qty, info.quantity_precision));
            let Some(required) = required.filter(|required| *required <= max_quantity) else {
                error!(
                    symbol = %symbol,
                    max_quantity = %max_quantity,
                    "Cannot meet minimum notional within risk budget"
                );
                return Decimal::ZERO;
            };

            quantity = required;
            info!(symbol = %symbol, quantity = %quantity, "Adjusted position size to meet minimum notional");
        }

        info!(
            symbol = %symbol,
            side = %side,
            quantity = %quantity,
            price = %price,
            "Calculated position size"
        );
        quantity
    }

    /// Leverage reported for the symbol, 1x when nothing is reported.
    pub fn get_current_leverage(&self, symbol: &str) -> u32 {
        match self.exchange.get_position_info(symbol) {
            Ok(Some(info)) if info.leverage > 0 => info.leverage,
            Ok(_) => 1,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Could not retrieve leverage, assuming 1x");
                1
            }
        }
    }

    // ==================== Entry Gate ====================

    /// Whether a new position may be opened on `symbol`.
    ///
    /// False when the symbol already has an open position, when the account
    /// is at its open-position limit, or when either can't be determined.
    pub fn should_open_position(&self, symbol: &str) -> bool {
        match self.exchange.get_position_info(symbol) {
            Ok(Some(info)) if info.is_open() => {
                info!(symbol = %symbol, amount = %info.position_amount, "Already have an open position");
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Could not retrieve position info");
                return false;
            }
        }

        let open_positions = match self.exchange.get_position_amounts() {
            Ok(positions) => positions.iter().filter(|p| p.is_open()).count(),
            Err(e) => {
                error!(error = %e, "Could not retrieve open positions");
                return false;
            }
        };

        if open_positions >= self.config.max_open_positions {
            info!(
                open = open_positions,
                max = self.config.max_open_positions,
                "Maximum number of open positions reached"
            );
            return false;
        }

        true
    }

    // ==================== Protective Levels ====================

    /// Stop loss price for a position entered at `entry_price`.
    ///
    /// Rounded away from the entry so the stop never collapses onto it.
    pub fn calculate_stop_loss(
        &self,
        symbol: &str,
        side: TradeSide,
        entry_price: Decimal,
    ) -> Option<Decimal> {
        let stop = self.stop_loss_level(symbol, side, entry_price)?;
        info!(symbol = %symbol, side = %side, stop_loss = %stop, "Calculated stop loss");
        Some(stop)
    }

    /// Take profit price for a position entered at `entry_price`.
    pub fn calculate_take_profit(
        &self,
        symbol: &str,
        side: TradeSide,
        entry_price: Decimal,
    ) -> Option<Decimal> {
        if !self.config.use_take_profit {
            return None;
        }

        let pct = self.config.take_profit_pct;
        let target = match side {
            TradeSide::Buy => entry_price * (Decimal::ONE + pct),
            TradeSide::Sell => entry_price * (Decimal::ONE - pct),
        };

        let target = match self.symbol_info(symbol) {
            Some(info) => target.round_dp(info.price_precision),
            None => target,
        };

        info!(symbol = %symbol, side = %side, take_profit = %target, "Calculated take profit");
        Some(target)
    }

    /// New trailing stop for an open position, if it improves on the current one.
    ///
    /// The current stop is the configured stop loss for the position's entry
    /// price. Long stops only move up and short stops only move down; `None`
    /// means leave the stop where it is.
    pub fn adjust_stop_loss_for_trailing(
        &self,
        symbol: &str,
        side: TradeSide,
        current_price: Decimal,
        position_info: Option<&PositionInfo>,
    ) -> Option<Decimal> {
        if !self.config.trailing_stop {
            return None;
        }

        let position = match position_info {
            Some(position) => position.clone(),
            None => match self.exchange.get_position_info(symbol) {
                Ok(position) => position?,
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "Could not retrieve position info");
                    return None;
                }
            },
        };

        if !position.is_open() {
            return None;
        }

        let info = self.symbol_info(symbol);
        let pct = self.config.trailing_stop_pct;
        let candidate = match side {
            TradeSide::Buy => current_price * (Decimal::ONE - pct),
            TradeSide::Sell => current_price * (Decimal::ONE + pct),
        };
        let candidate = round_stop(candidate, side, info.as_ref());

        if let Some(current_stop) = self.stop_loss_level(symbol, side, position.entry_price) {
            let improves = match side {
                TradeSide::Buy => candidate > current_stop,
                TradeSide::Sell => candidate < current_stop,
            };
            if !improves {
                debug!(
                    symbol = %symbol,
                    candidate = %candidate,
                    current = %current_stop,
                    "Trailing stop does not improve current stop"
                );
                return None;
            }
        }

        info!(symbol = %symbol, side = %side, stop_loss = %candidate, "Adjusted trailing stop loss");
        Some(candidate)
    }

    // ==================== Compounding ====================

    /// Record balance growth since the last observation.
    ///
    /// The first call only initializes the trackers. Later calls return true
    /// when the balance strictly increased. The reinvested share is reported,
    /// not applied: sizing always works from the live balance.
    pub fn update_balance_for_compounding(&mut self) -> bool {
        if !self.config.auto_compound {
            return false;
        }

        let balance = match self.exchange.get_account_balance() {
            Ok(balance) => balance,
            Err(e) => {
                error!(error = %e, "Could not retrieve account balance");
                return false;
            }
        };

        let Some(snapshot) = self.balances else {
            self.balances = Some(BalanceSnapshot::new(balance));
            return false;
        };

        let profit = balance - snapshot.last_known;
        if profit <= Decimal::ZERO {
            return false;
        }

        self.balances = Some(BalanceSnapshot {
            last_known: balance,
            ..snapshot
        });

        let reinvest_amount = profit * self.config.compound_reinvest_percent;
        info!(
            reinvest = %reinvest_amount.round_dp(2),
            profit = %profit.round_dp(2),
            growth = %self.equity_growth().unwrap_or_default().round_dp(4),
            "Auto-compounding recent profit"
        );
        true
    }

    // ==================== Helpers ====================

    fn symbol_info(&self, symbol: &str) -> Option<SymbolInfo> {
        match self.exchange.get_symbol_info(symbol) {
            Ok(info) => info,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Symbol info query failed");
                None
            }
        }
    }

    fn stop_loss_level(&self, symbol: &str, side: TradeSide, entry_price: Decimal) -> Option<Decimal> {
        if !self.config.use_stop_loss {
            return None;
        }

        let pct = self.config.stop_loss_pct;
        let stop = match side {
            TradeSide::Buy => entry_price * (Decimal::ONE - pct),
            TradeSide::Sell => entry_price * (Decimal::ONE + pct),
        };
        Some(round_stop(stop, side, self.symbol_info(symbol).as_ref()))
    }
}

/// Round a stop price to the symbol's price precision, away from the position.
fn round_stop(stop: Decimal, side: TradeSide, info: Option<&SymbolInfo>) -> Decimal {
    let Some(info) = info else {
        return stop;
    };
    let strategy = if side.is_long() {
        RoundingStrategy::ToNegativeInfinity
    } else {
        RoundingStrategy::ToPositiveInfinity
    };
    stop.round_dp_with_strategy(info.price_precision, strategy)
}

/// Floor a quantity to a whole number of exchange steps.
///
/// A non-positive step leaves the quantity untouched. A quantity too large to
/// divide by the step sizes to zero.
pub fn round_step_size(quantity: Decimal, step_size: Decimal) -> Decimal {
    if step_size <= Decimal::ZERO {
        return quantity;
    }
    quantity
        .checked_div(step_size)
        .map_or(Decimal::ZERO, |steps| steps.floor() * step_size)
}

/// Smallest whole number of steps covering `quantity`, on the same grid as
/// [`round_step_size`]. Without a usable step, rounds up at `precision` places.
fn ceil_step_size(quantity: Decimal, step_size: Decimal, precision: u32) -> Option<Decimal> {
    if step_size <= Decimal::ZERO {
        return Some(quantity.round_dp_with_strategy(precision, RoundingStrategy::ToPositiveInfinity));
    }
    quantity
        .checked_div(step_size)
        .and_then(|steps| steps.ceil().checked_mul(step_size))
}
