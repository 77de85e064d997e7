//! Billing math for transcribed audio.

/// Deepgram Nova-3 pay-as-you-go rate in USD per minute of audio.
/// Override at runtime with the `DG_RATE_PER_MIN` environment variable.
pub const DEFAULT_RATE_PER_MIN: f64 = 0.0043;

/// Cost in USD for `duration_secs` of audio billed at `rate_per_min`.
///
/// Pure linear model: fractional minutes are billed proportionally,
/// zero duration costs zero. No rounding — callers format for display.
pub fn cost_usd(duration_secs: f64, rate_per_min: f64) -> f64 {
    (duration_secs / 60.0) * rate_per_min
}
