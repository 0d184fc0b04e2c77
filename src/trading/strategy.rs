//! Signal strategies: RSI, EMA crossover, RSI+EMA confirmation, Bollinger Bands.
//!
//! Every strategy fires on a transition between the previous and the current
//! bar, never on a sustained level, so a condition that persists for several
//! bars produces a single signal.

use std::fmt;

use tracing::{info, warn};

use crate::indicators::IndicatorCalculator;
use crate::models::{closes, PriceBar, Signal};

use super::StrategyConfig;

/// A signal generator over a window of price bars.
pub trait Strategy {
    /// Registry name of the strategy.
    fn name(&self) -> &str;

    /// Signal for the most recent bar of `bars` (ordered oldest first).
    fn get_signal(&self, bars: &[PriceBar]) -> Signal;
}

/// Fixed registry of available strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Rsi,
    EmaCross,
    RsiEma,
    BollingerBands,
}

impl StrategyKind {
    pub fn all() -> [StrategyKind; 4] {
        [
            StrategyKind::Rsi,
            StrategyKind::EmaCross,
            StrategyKind::RsiEma,
            StrategyKind::BollingerBands,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Rsi => "RSI",
            StrategyKind::EmaCross => "EMA_Cross",
            StrategyKind::RsiEma => "RSI_EMA",
            StrategyKind::BollingerBands => "Bollinger_Bands",
        }
    }

    /// Exact (case-sensitive) registry lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.name() == name)
    }

    /// Build a fresh strategy instance.
    pub fn build(&self, config: &StrategyConfig) -> Box<dyn Strategy> {
        match self {
            StrategyKind::Rsi => Box::new(RsiStrategy::new(config)),
            StrategyKind::EmaCross => Box::new(EmaCrossStrategy::new(config)),
            StrategyKind::RsiEma => Box::new(RsiEmaStrategy::new(config)),
            StrategyKind::BollingerBands => Box::new(BollingerBandsStrategy::new(config)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Get a strategy by registry name.
///
/// Unknown names fall back to the RSI+EMA composite.
pub fn get_strategy(name: &str, config: &StrategyConfig) -> Box<dyn Strategy> {
    let kind = StrategyKind::from_name(name).unwrap_or_else(|| {
        warn!(
            strategy = %name,
            fallback = StrategyKind::RsiEma.name(),
            "Strategy not found, using default"
        );
        StrategyKind::RsiEma
    });
    kind.build(config)
}

// ==================== RSI ====================

/// RSI threshold crossing.
///
/// BUY when RSI drops from at or above the oversold level to below it, SELL
/// when RSI rises from at or below the overbought level to above it.
#[derive(Debug, Clone)]
pub struct RsiStrategy {
    period: usize,
    overbought: f64,
    oversold: f64,
}

impl RsiStrategy {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            period: config.rsi_period,
            overbought: config.rsi_overbought,
            oversold: config.rsi_oversold,
        }
    }
}

impl Strategy for RsiStrategy {
    fn name(&self) -> &str {
        StrategyKind::Rsi.name()
    }

    fn get_signal(&self, bars: &[PriceBar]) -> Signal {
        let rsi = IndicatorCalculator::rsi(&closes(bars), self.period);
        let Some((prev, last)) = IndicatorCalculator::last_two(&rsi) else {
            return Signal::None;
        };

        if last < self.oversold && prev >= self.oversold {
            info!(rsi = last, "RSI: BUY signal, crossed below oversold level");
            Signal::Buy
        } else if last > self.overbought && prev <= self.overbought {
            info!(rsi = last, "RSI: SELL signal, crossed above overbought level");
            Signal::Sell
        } else {
            Signal::None
        }
    }
}

// ==================== EMA crossover ====================

/// Fast/slow EMA crossover.
#[derive(Debug, Clone)]
pub struct EmaCrossStrategy {
    fast_period: usize,
    slow_period: usize,
}

impl EmaCrossStrategy {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            fast_period: config.fast_ema,
            slow_period: config.slow_ema,
        }
    }
}

impl Strategy for EmaCrossStrategy {
    fn name(&self) -> &str {
        StrategyKind::EmaCross.name()
    }

    fn get_signal(&self, bars: &[PriceBar]) -> Signal {
        let closes = closes(bars);
        let fast = IndicatorCalculator::ema(&closes, self.fast_period);
        let slow = IndicatorCalculator::ema(&closes, self.slow_period);

        let (Some((prev_fast, fast)), Some((prev_slow, slow))) = (
            IndicatorCalculator::last_two(&fast),
            IndicatorCalculator::last_two(&slow),
        ) else {
            return Signal::None;
        };

        if fast > slow && prev_fast <= prev_slow {
            info!("EMA: BUY signal, fast EMA crossed above slow EMA");
            Signal::Buy
        } else if fast < slow && prev_fast >= prev_slow {
            info!("EMA: SELL signal, fast EMA crossed below slow EMA");
            Signal::Sell
        } else {
            Signal::None
        }
    }
}

// ==================== RSI + EMA ====================

/// RSI signal confirmed by the EMA crossover.
///
/// RSI leads; the EMA may agree or stay neutral, but a contradicting EMA
/// signal cancels the trade.
pub struct RsiEmaStrategy {
    rsi: Box<dyn Strategy>,
    ema: Box<dyn Strategy>,
}

impl RsiEmaStrategy {
    pub fn new(config: &StrategyConfig) -> Self {
        Self::from_parts(
            Box::new(RsiStrategy::new(config)),
            Box::new(EmaCrossStrategy::new(config)),
        )
    }

    /// Compose arbitrary leading and confirming strategies.
    pub fn from_parts(rsi: Box<dyn Strategy>, ema: Box<dyn Strategy>) -> Self {
        Self { rsi, ema }
    }
}

impl Strategy for RsiEmaStrategy {
    fn name(&self) -> &str {
        StrategyKind::RsiEma.name()
    }

    fn get_signal(&self, bars: &[PriceBar]) -> Signal {
        let rsi_signal = self.rsi.get_signal(bars);
        let ema_signal = self.ema.get_signal(bars);

        match (rsi_signal, ema_signal) {
            (Signal::Buy, Signal::Buy | Signal::None) => {
                info!(ema = %ema_signal, "RSI_EMA: BUY signal confirmed");
                Signal::Buy
            }
            (Signal::Sell, Signal::Sell | Signal::None) => {
                info!(ema = %ema_signal, "RSI_EMA: SELL signal confirmed");
                Signal::Sell
            }
            _ => Signal::None,
        }
    }
}

// ==================== Bollinger Bands ====================

/// Mean-reversion entries on band breaks.
///
/// BUY when the close falls through the lower band, SELL when it rises
/// through the upper band.
#[derive(Debug, Clone)]
pub struct BollingerBandsStrategy {
    window: usize,
    num_std: f64,
}

impl BollingerBandsStrategy {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            window: config.bb_window,
            num_std: config.bb_std_dev,
        }
    }
}

impl Strategy for BollingerBandsStrategy {
    fn name(&self) -> &str {
        StrategyKind::BollingerBands.name()
    }

    fn get_signal(&self, bars: &[PriceBar]) -> Signal {
        let closes = closes(bars);
        let bands = IndicatorCalculator::bollinger_bands(&closes, self.window, self.num_std);

        let (
            Some((prev_price, price)),
            Some((prev_low, low)),
            Some((_, middle)),
            Some((prev_high, high)),
        ) = (
            IndicatorCalculator::last_two(&closes),
            IndicatorCalculator::last_two(&bands.lower),
            IndicatorCalculator::last_two(&bands.middle),
            IndicatorCalculator::last_two(&bands.upper),
        ) else {
            return Signal::None;
        };

        if price < low && prev_price >= prev_low {
            info!(
                price = price,
                lower = low,
                middle = middle,
                "BB: BUY signal, price crossed below lower band"
            );
            Signal::Buy
        } else if price > high && prev_price <= prev_high {
            info!(
                price = price,
                upper = high,
                middle = middle,
                "BB: SELL signal, price crossed above upper band"
            );
            Signal::Sell
        } else {
            Signal::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open_time: DateTime<Utc> = start + Duration::minutes(i as i64);
                let open = if i == 0 { close } else { closes[i - 1] };
                PriceBar {
                    open_time,
                    open,
                    high: open.max(close) + 0.5,
                    low: open.min(close) - 0.5,
                    close,
                    volume: 1000.0,
                    close_time: open_time + Duration::seconds(59),
                }
            })
            .collect()
    }

    /// Signal for every prefix of `bars`, i.e. what a live feed would see bar by bar.
    fn signals_by_bar(strategy: &dyn Strategy, bars: &[PriceBar]) -> Vec<Signal> {
        (1..=bars.len()).map(|n| strategy.get_signal(&bars[..n])).collect()
    }

    fn config() -> StrategyConfig {
        StrategyConfig {
            rsi_period: 3,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            fast_ema: 2,
            slow_ema: 4,
            bb_window: 10,
            bb_std_dev: 2.0,
        }
    }

    /// Stub returning a fixed signal.
    struct Fixed(Signal);

    impl Strategy for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn get_signal(&self, _bars: &[PriceBar]) -> Signal {
            self.0
        }
    }

    // RSI(3) from bar 2: 100, 100, 100, 100, 63.5, 41.0, 19.9, 9.2, 7.3, 20.0, 33.6, 56.1, 70.9
    const RSI_CLOSES: [f64; 15] = [
        100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 104.0, 103.0, 101.0, 98.0, 97.0, 97.5, 98.0,
        99.0, 100.0,
    ];

    #[test]
    fn test_rsi_buy_only_on_crossing_bar() {
        let strategy = RsiStrategy::new(&config());
        let signals = signals_by_bar(&strategy, &make_bars(&RSI_CLOSES));

        assert_eq!(signals[8], Signal::Buy); // 41.0 -> 19.9
        assert_eq!(signals[7], Signal::None);
        assert_eq!(signals[9], Signal::None); // still oversold, no re-trigger
        assert_eq!(signals.iter().filter(|s| **s == Signal::Buy).count(), 1);
    }

    #[test]
    fn test_rsi_sell_on_overbought_cross() {
        let strategy = RsiStrategy::new(&config());
        let signals = signals_by_bar(&strategy, &make_bars(&RSI_CLOSES));

        assert_eq!(signals[14], Signal::Sell); // 56.1 -> 70.9
        assert_eq!(signals.iter().filter(|s| **s == Signal::Sell).count(), 1);
    }

    #[test]
    fn test_rsi_fires_on_period_plus_one_bars() {
        // RSI(3): NaN, NaN, 40.0, 4.0
        let strategy = RsiStrategy::new(&config());
        let bars = make_bars(&[100.0, 101.0, 100.0, 90.0]);
        assert_eq!(strategy.get_signal(&bars), Signal::Buy);
    }

    #[test]
    fn test_rsi_needs_two_values() {
        let strategy = RsiStrategy::new(&config());
        // Only one RSI value (index 2) available.
        let bars = make_bars(&[100.0, 90.0, 80.0]);
        assert_eq!(strategy.get_signal(&bars), Signal::None);
        assert_eq!(strategy.get_signal(&[]), Signal::None);
    }

    const EMA_CLOSES: [f64; 11] = [
        100.0, 99.0, 98.0, 97.0, 96.0, 95.0, 96.0, 98.0, 101.0, 104.0, 106.0,
    ];

    #[test]
    fn test_ema_cross_up() {
        let strategy = EmaCrossStrategy::new(&config());
        let signals = signals_by_bar(&strategy, &make_bars(&EMA_CLOSES));

        // fast 95.83 < slow 96.23 at bar 6, fast 97.28 > slow 96.94 at bar 7
        assert_eq!(signals[6], Signal::None);
        assert_eq!(signals[7], Signal::Buy);
        assert_eq!(signals[8], Signal::None);
        assert_eq!(signals.iter().filter(|s| **s != Signal::None).count(), 1);
    }

    #[test]
    fn test_ema_cross_down() {
        let falling: Vec<f64> = EMA_CLOSES.iter().map(|c| 200.0 - c).collect();
        let strategy = EmaCrossStrategy::new(&config());
        let signals = signals_by_bar(&strategy, &make_bars(&falling));

        assert_eq!(signals[7], Signal::Sell);
        assert_eq!(signals.iter().filter(|s| **s != Signal::None).count(), 1);
    }

    #[test]
    fn test_composite_confirmation_table() {
        let cases = [
            (Signal::Buy, Signal::Buy, Signal::Buy),
            (Signal::Buy, Signal::None, Signal::Buy),
            (Signal::Buy, Signal::Sell, Signal::None),
            (Signal::Sell, Signal::Sell, Signal::Sell),
            (Signal::Sell, Signal::None, Signal::Sell),
            (Signal::Sell, Signal::Buy, Signal::None),
            (Signal::None, Signal::Buy, Signal::None),
            (Signal::None, Signal::Sell, Signal::None),
            (Signal::None, Signal::None, Signal::None),
        ];

        let bars = make_bars(&[100.0, 101.0]);
        for (rsi, ema, expected) in cases {
            let strategy =
                RsiEmaStrategy::from_parts(Box::new(Fixed(rsi)), Box::new(Fixed(ema)));
            assert_eq!(
                strategy.get_signal(&bars),
                expected,
                "rsi={} ema={}",
                rsi,
                ema
            );
        }
    }

    #[test]
    fn test_composite_with_real_indicators() {
        // RSI buys at bar 8 while the EMAs are already crossed down (no new cross).
        let strategy = RsiEmaStrategy::new(&config());
        let bars = make_bars(&RSI_CLOSES);
        assert_eq!(strategy.get_signal(&bars[..9]), Signal::Buy);
    }

    const BB_BASE: [f64; 12] = [
        100.0, 100.5, 99.5, 100.0, 100.5, 99.5, 100.0, 99.8, 100.2, 100.0, 99.9, 100.1,
    ];

    #[test]
    fn test_bollinger_buy_below_lower_band() {
        let mut closes = BB_BASE.to_vec();
        closes.extend([97.0, 96.5, 99.0]);
        let strategy = BollingerBandsStrategy::new(&config());
        let signals = signals_by_bar(&strategy, &make_bars(&closes));

        assert_eq!(signals[12], Signal::Buy); // 97.0 < lower 97.83
        assert_eq!(signals[13], Signal::None); // still below, no re-trigger
        assert_eq!(signals.iter().filter(|s| **s != Signal::None).count(), 1);
    }

    #[test]
    fn test_bollinger_sell_above_upper_band() {
        let mut closes = BB_BASE.to_vec();
        closes.extend([103.0, 103.5]);
        let strategy = BollingerBandsStrategy::new(&config());
        let signals = signals_by_bar(&strategy, &make_bars(&closes));

        assert_eq!(signals[12], Signal::Sell); // 103.0 > upper 102.17
        assert_eq!(signals[13], Signal::None);
    }

    #[test]
    fn test_factory_registry() {
        let config = config();
        for kind in StrategyKind::all() {
            let strategy = get_strategy(kind.name(), &config);
            assert_eq!(strategy.name(), kind.name());
        }
        assert_eq!(StrategyKind::from_name("rsi"), None);
    }

    #[test]
    fn test_unknown_strategy_falls_back_to_composite() {
        let config = config();
        let fallback = get_strategy("MACD", &config);
        let composite = get_strategy("RSI_EMA", &config);
        assert_eq!(fallback.name(), "RSI_EMA");

        let bars = make_bars(&RSI_CLOSES);
        for n in 1..=bars.len() {
            assert_eq!(
                fallback.get_signal(&bars[..n]),
                composite.get_signal(&bars[..n])
            );
        }
    }
}
