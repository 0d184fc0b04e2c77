//! Calculator for technical indicators: RSI, EMA, SMA, Bollinger Bands.
//!
//! Every series has the same length as its input. Positions inside an
//! indicator's warm-up window hold `f64::NAN`.

use statrs::statistics::Statistics;

/// Upper, middle and lower Bollinger series.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub middle: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Calculator for indicator series over close prices.
pub struct IndicatorCalculator;

impl IndicatorCalculator {
    /// Relative Strength Index with Wilder smoothing (`alpha = 1 / period`).
    ///
    /// Average gain and loss start at zero on the first bar and are smoothed
    /// from the first price change on, so the first value is reported at index
    /// `period - 1`. RSI is 100 whenever the average loss is zero.
    pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
        let mut result = vec![f64::NAN; closes.len()];
        if period == 0 {
            return result;
        }

        let alpha = 1.0 / period as f64;
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;

        for i in 0..closes.len() {
            if i > 0 {
                let change = closes[i] - closes[i - 1];
                avg_gain = alpha * change.max(0.0) + (1.0 - alpha) * avg_gain;
                avg_loss = alpha * (-change).max(0.0) + (1.0 - alpha) * avg_loss;
            }

            if i + 1 >= period {
                result[i] = if avg_loss == 0.0 {
                    100.0
                } else {
                    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
                };
            }
        }

        result
    }

    /// Exponential moving average (`alpha = 2 / (period + 1)`), seeded with the
    /// first close. Values before index `period - 1` are NaN.
    pub fn ema(closes: &[f64], period: usize) -> Vec<f64> {
        let mut result = vec![f64::NAN; closes.len()];
        if period == 0 || closes.is_empty() {
            return result;
        }

        let alpha = 2.0 / (period as f64 + 1.0);
        let mut ema = closes[0];

        for (i, &close) in closes.iter().enumerate() {
            if i > 0 {
                ema = alpha * close + (1.0 - alpha) * ema;
            }
            if i + 1 >= period {
                result[i] = ema;
            }
        }

        result
    }

    /// Simple moving average over a trailing window.
    pub fn sma(closes: &[f64], period: usize) -> Vec<f64> {
        let mut result = vec![f64::NAN; closes.len()];
        if period == 0 {
            return result;
        }

        for i in (period.saturating_sub(1))..closes.len() {
            result[i] = closes[i + 1 - period..=i].iter().mean();
        }

        result
    }

    /// Bollinger Bands: SMA middle band with upper/lower bands `num_std`
    /// population standard deviations away.
    pub fn bollinger_bands(closes: &[f64], period: usize, num_std: f64) -> BollingerBands {
        let middle = Self::sma(closes, period);
        let mut upper = vec![f64::NAN; closes.len()];
        let mut lower = vec![f64::NAN; closes.len()];

        if period > 0 {
            for i in (period - 1)..closes.len() {
                let std_dev = closes[i + 1 - period..=i].iter().population_std_dev();
                upper[i] = middle[i] + num_std * std_dev;
                lower[i] = middle[i] - num_std * std_dev;
            }
        }

        BollingerBands {
            middle,
            upper,
            lower,
        }
    }

    /// The last two values as `(previous, current)`, if both are finite.
    pub fn last_two(series: &[f64]) -> Option<(f64, f64)> {
        match series {
            [.., prev, current] if prev.is_finite() && current.is_finite() => {
                Some((*prev, *current))
            }
            _ => None,
        }
    }
}
