//! Option pricing inputs and the closed-form call model.
//!
//! - Realized volatility over a trailing window
//! - Black-Scholes European call
//! - Intrinsic value of a call vertical at expiration

pub mod black_scholes;
pub mod volatility;

pub use black_scholes::{call_spread_intrinsic, norm_cdf, price_call};
pub use volatility::{round_to, trailing_path_window, VolatilityEstimator};
