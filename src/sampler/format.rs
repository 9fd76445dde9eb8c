/// Renders `value` with exactly `places` decimals, rounding half away from zero.
///
/// Undefined values (NaN, infinities) render as zero, so a degenerate division never leaks
/// `NaN` into a record.
pub fn format_decimal(value: f64, places: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let scale = 10f64.powi(i32::try_from(places).unwrap_or(i32::MAX));
    let mut rounded = (value * scale).round() / scale;
    if !rounded.is_finite() {
        rounded = value;
    }
    // avoid "-0.00"
    if rounded == 0.0 {
        rounded = 0.0;
    }
    format!("{rounded:.places$}")
}
