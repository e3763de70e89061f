//! Closed-form European call valuation.
//!
//! d1 = (ln(S/K) + (r + sigma^2/2) T) / (sigma sqrt(T)), d2 = d1 - sigma sqrt(T),
//! C = S N(d1) - K e^(-rT) N(d2).
//!
//! Degenerate inputs are rejected rather than clipped.

use std::f64::consts::FRAC_1_SQRT_2;

use statrs::function::erf::erfc;

use crate::error::PreconditionError;

/// Standard normal CDF.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x * FRAC_1_SQRT_2)
}

/// Price a European call.
///
/// # Arguments
/// * `spot` - Underlying price (> 0)
/// * `strike` - Strike price (> 0)
/// * `sigma` - Annualized volatility (> 0)
/// * `time_to_expiry` - Years to expiration (> 0)
/// * `risk_free_rate` - Continuously compounded rate
pub fn price_call(
    spot: f64,
    strike: f64,
    sigma: f64,
    time_to_expiry: f64,
    risk_free_rate: f64,
) -> Result<f64, PreconditionError> {
    if !(spot > 0.0) {
        return Err(PreconditionError::NonPositivePrice(spot));
    }
    if !(strike > 0.0) {
        return Err(PreconditionError::NonPositivePrice(strike));
    }
    if !(sigma > 0.0) {
        return Err(PreconditionError::NonPositiveVolatility(sigma));
    }
    if !(time_to_expiry > 0.0) {
        return Err(PreconditionError::NonPositiveTime(time_to_expiry));
    }

    let vol_sqrt_t = sigma * time_to_expiry.sqrt();
    let d1 = ((spot / strike).ln() + (risk_free_rate + 0.5 * sigma * sigma) * time_to_expiry)
        / vol_sqrt_t;
    let d2 = d1 - vol_sqrt_t;

    Ok(spot * norm_cdf(d1) - strike * (-risk_free_rate * time_to_expiry).exp() * norm_cdf(d2))
}

/// Value of a long-call / short-call vertical at expiration.
pub fn call_spread_intrinsic(spot: f64, long_strike: f64, short_strike: f64) -> f64 {
    (spot - long_strike).max(0.0) - (spot - short_strike).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn test_norm_cdf_reference_values() {
        let cases = [
            (-3.0, 0.0013498980316301035),
            (-1.0, 0.15865525393145707),
            (0.0, 0.5),
            (1.0, 0.8413447460685429),
            (3.0, 0.9986501019683699),
        ];
        for (x, expected) in cases {
            let got = norm_cdf(x);
            assert!(approx_eq(got, expected, 1e-10), "norm_cdf({x}) expected {expected}, got {got}");
        }
    }

    #[test]
    fn test_call_price_reference() {
        // S=100, K=100, sigma=20%, T=1, r=5% -> 10.4506
        let price = price_call(100.0, 100.0, 0.2, 1.0, 0.05).unwrap();
        assert!(approx_eq(price, 10.450583572185565, 1e-9), "got {price}");
    }

    #[test]
    fn test_at_the_money_zero_rate_is_positive() {
        let price = price_call(50.0, 50.0, 0.3, 0.5, 0.0).unwrap();
        assert!(price > 0.0);
    }

    #[test]
    fn test_monotone_in_spot() {
        let mut prev = 0.0;
        for s in (50..=150).map(|s| s as f64) {
            let price = price_call(s, 100.0, 0.25, 2.0, 0.03).unwrap();
            assert!(price >= prev, "price fell at spot {s}");
            prev = price;
        }
    }

    #[test]
    fn test_decreasing_in_strike() {
        let low = price_call(100.0, 95.0, 0.25, 2.0, 0.03).unwrap();
        let high = price_call(100.0, 105.0, 0.25, 2.0, 0.03).unwrap();
        assert!(low > high);
    }

    #[test]
    fn test_degenerate_inputs_rejected() {
        assert_eq!(
            price_call(100.0, 100.0, 0.0, 1.0, 0.0),
            Err(PreconditionError::NonPositiveVolatility(0.0))
        );
        assert_eq!(
            price_call(100.0, 100.0, 0.2, 0.0, 0.0),
            Err(PreconditionError::NonPositiveTime(0.0))
        );
        assert_eq!(
            price_call(-1.0, 100.0, 0.2, 1.0, 0.0),
            Err(PreconditionError::NonPositivePrice(-1.0))
        );
        assert!(price_call(100.0, 100.0, f64::NAN, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_spread_intrinsic() {
        assert_eq!(call_spread_intrinsic(90.0, 100.0, 110.0), 0.0);
        assert_eq!(call_spread_intrinsic(105.0, 100.0, 110.0), 5.0);
        assert_eq!(call_spread_intrinsic(130.0, 100.0, 110.0), 10.0);
    }
}
