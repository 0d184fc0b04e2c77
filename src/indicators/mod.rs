//! Technical indicator series used by the signal strategies.

mod calculator;

pub use calculator::IndicatorCalculator;
