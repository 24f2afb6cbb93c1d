use chrono::{DateTime, NaiveDate, Utc};

const BYTE_UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Format a byte count with the most fitting binary unit, e.g. `1.5 MB`.
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Byte".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    format_in_unit(bytes, decimals, exponent.min(BYTE_UNITS.len() - 1))
}

/// Format a byte count in gigabytes, which is what model and RAM sizes read best in.
pub fn format_gigabytes(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Byte".to_string();
    }
    format_in_unit(bytes, decimals, 3)
}

fn format_in_unit(bytes: u64, decimals: usize, exponent: usize) -> String {
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let mut number = format!("{:.*}", decimals, value);
    // "4.0" reads as "4"
    if number.contains('.') {
        number = number.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{} {}", number, BYTE_UNITS[exponent])
}

/// Human age of a timestamp, e.g. `3 weeks`, or `today`.
///
/// Accepts RFC 3339 timestamps as well as bare `YYYY-MM-DD` dates; anything
/// else is returned unchanged.
pub fn format_age(timestamp: &str, now: DateTime<Utc>) -> String {
    let parsed = DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(timestamp, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        });
    let Some(then) = parsed else {
        return timestamp.to_string();
    };

    let days = (now - then).num_days();
    let plural = |n: i64, unit: &str| format!("{} {}{}", n, unit, if n > 1 { "s" } else { "" });
    match days {
        d if d >= 365 => plural(d / 365, "year"),
        d if d >= 30 => plural(d / 30, "month"),
        d if d >= 7 => plural(d / 7, "week"),
        d if d > 0 => plural(d, "day"),
        _ => "today".to_string(),
    }
}
