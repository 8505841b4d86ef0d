//! Numeric quantity features.

use serde::{Deserialize, Serialize};

/// Upper bounds (inclusive) of the first three quantity bins.
const QUANTITY_BIN_EDGES: [f64; 3] = [10.0, 100.0, 500.0];

/// Log, ratio and bin features derived from the two quantities.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NumericFeatures {
    /// `ln(cantidad + 1)`
    pub cantidad_log: Option<f64>,
    /// `ln(cantidad_cum + 1)`
    pub cantidad_cum_log: Option<f64>,
    /// `cantidad / cantidad_cum`, absent when the reference quantity is zero
    pub ratio_cantidad: Option<f64>,
    /// 0 (<=10), 1 (<=100), 2 (<=500) or 3
    pub cantidad_bin: Option<u8>,
}

impl NumericFeatures {
    pub fn compute(cantidad: Option<f64>, cantidad_cum: Option<f64>) -> Self {
        Self {
            cantidad_log: cantidad.and_then(log1p),
            cantidad_cum_log: cantidad_cum.and_then(log1p),
            ratio_cantidad: quantity_ratio(cantidad, cantidad_cum),
            cantidad_bin: cantidad.map(quantity_bin),
        }
    }
}

fn log1p(value: f64) -> Option<f64> {
    let log = (value + 1.0).ln();
    log.is_finite().then_some(log)
}

/// `q / reference`, or `None` when either is missing or the result is not finite.
pub fn quantity_ratio(quantity: Option<f64>, reference: Option<f64>) -> Option<f64> {
    let (q, r) = (quantity?, reference?);
    if r == 0.0 {
        return None;
    }
    let ratio = q / r;
    ratio.is_finite().then_some(ratio)
}

pub fn quantity_bin(quantity: f64) -> u8 {
    QUANTITY_BIN_EDGES
        .iter()
        .position(|edge| quantity <= *edge)
        .unwrap_or(QUANTITY_BIN_EDGES.len()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bins() {
        assert_eq!(quantity_bin(0.0), 0);
        assert_eq!(quantity_bin(10.0), 0);
        assert_eq!(quantity_bin(10.5), 1);
        assert_eq!(quantity_bin(100.0), 1);
        assert_eq!(quantity_bin(500.0), 2);
        assert_eq!(quantity_bin(500.1), 3);
    }

    #[test]
    fn test_zero_reference_quantity_fails_soft() {
        assert_eq!(quantity_ratio(Some(5.0), Some(0.0)), None);
        assert_eq!(quantity_ratio(None, Some(2.0)), None);
        assert_eq!(quantity_ratio(Some(5.0), Some(2.0)), Some(2.5));
    }

    #[test]
    fn test_compute() {
        let features = NumericFeatures::compute(Some(500.0), Some(0.0));
        assert!((features.cantidad_log.unwrap() - 501f64.ln()).abs() < 1e-12);
        assert_eq!(features.cantidad_cum_log, Some(0.0));
        assert_eq!(features.ratio_cantidad, None);
        assert_eq!(features.cantidad_bin, Some(2));

        let missing = NumericFeatures::compute(None, None);
        assert_eq!(missing, NumericFeatures::default());
    }
}
