//! Human readable numbers in the notation the CLI has always printed.

const BINARY_UNITS: [&str; 9] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];
const DECIMAL_UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Formats `value` with at most `precision` significant digits, switching to
/// exponent notation for very small or large magnitudes. Trailing zeros are dropped.
///
/// ```
/// # use creo_stats::format::format_significant;
/// assert_eq!(format_significant(1.5, 4), "1.5");
/// assert_eq!(format_significant(123456.0, 4), "1.235e+05");
/// assert_eq!(format_significant(0.000012, 3), "1.2e-05");
/// ```
pub fn format_significant(value: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if value == 0.0 {
        return "0".to_owned();
    }
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_owned();
    }

    // Rounding to the requested digits first decides the exponent, so 9.9996 at four
    // digits is treated as 10.
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exp) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_owned()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn scale<'a>(mut size: f64, base: f64, units: &[&'a str]) -> (f64, &'a str) {
    let mut i = 0;
    while size >= base && i < units.len() - 1 {
        size /= base;
        i += 1;
    }
    (size, units[i])
}

/// Formats a byte count with binary units and four significant digits, e.g. `1.5KiB`.
pub fn bytes_size(size: f64) -> String {
    let (size, unit) = scale(size, 1024.0, &BINARY_UNITS);
    format!("{}{unit}", format_significant(size, 4))
}

/// Formats a byte count with decimal units and `precision` significant digits, e.g. `1.23MB`.
pub fn human_size_with_precision(size: f64, precision: usize) -> String {
    let (size, unit) = scale(size, 1000.0, &DECIMAL_UNITS);
    format!("{}{unit}", format_significant(size, precision))
}
