//
// On-demand duration parsing for resolved string values, grounded on pyhocon's
// `period_parser.py::period_type_map` (the main HOCON grammar never produces a duration literal
// at parse time — see SPEC_FULL.md's Duration section).
//

use lazy_static::lazy_static;
use phf::phf_map;
use regex::Regex;

const NANOS_PER_MICRO: f64 = 1_000.0;
const NANOS_PER_MILLI: f64 = 1_000_000.0;
const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
const NANOS_PER_MINUTE: f64 = 60.0 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: f64 = 60.0 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: f64 = 24.0 * NANOS_PER_HOUR;
const NANOS_PER_WEEK: f64 = 7.0 * NANOS_PER_DAY;
// Calendar-aware units have no fixed length; approximated as 30/365 fixed days (Open Question
// decision, recorded in DESIGN.md).
const NANOS_PER_MONTH: f64 = 30.0 * NANOS_PER_DAY;
const NANOS_PER_YEAR: f64 = 365.0 * NANOS_PER_DAY;

static UNIT_NANOS: phf::Map<&'static str, f64> = phf_map! {
    "ns" => 1.0, "nano" => 1.0, "nanos" => 1.0, "nanosecond" => 1.0, "nanoseconds" => 1.0,
    "us" => NANOS_PER_MICRO, "micro" => NANOS_PER_MICRO, "micros" => NANOS_PER_MICRO,
    "microsecond" => NANOS_PER_MICRO, "microseconds" => NANOS_PER_MICRO,
    "ms" => NANOS_PER_MILLI, "milli" => NANOS_PER_MILLI, "millis" => NANOS_PER_MILLI,
    "millisecond" => NANOS_PER_MILLI, "milliseconds" => NANOS_PER_MILLI,
    "s" => NANOS_PER_SECOND, "second" => NANOS_PER_SECOND, "seconds" => NANOS_PER_SECOND,
    "m" => NANOS_PER_MINUTE, "minute" => NANOS_PER_MINUTE, "minutes" => NANOS_PER_MINUTE,
    "h" => NANOS_PER_HOUR, "hour" => NANOS_PER_HOUR, "hours" => NANOS_PER_HOUR,
    "d" => NANOS_PER_DAY, "day" => NANOS_PER_DAY, "days" => NANOS_PER_DAY,
    "w" => NANOS_PER_WEEK, "week" => NANOS_PER_WEEK, "weeks" => NANOS_PER_WEEK,
    "mo" => NANOS_PER_MONTH, "month" => NANOS_PER_MONTH, "months" => NANOS_PER_MONTH,
    "y" => NANOS_PER_YEAR, "year" => NANOS_PER_YEAR, "years" => NANOS_PER_YEAR,
};

lazy_static! {
    static ref PERIOD_PATTERN: Regex =
        Regex::new(r"^\s*([+-]?\d+(?:\.\d+)?)\s*([A-Za-z]*)\s*$").unwrap();
}

/// Parses a resolved string value like `"10s"` or `"1.5 hours"` into a nanosecond count. A bare
/// number with no unit defaults to milliseconds, matching Typesafe config's `getDuration`.
pub fn parse_duration_nanos(text: &str) -> Option<i64> {
    let caps = PERIOD_PATTERN.captures(text)?;
    let magnitude: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let factor = if unit.is_empty() {
        NANOS_PER_MILLI
    } else {
        *UNIT_NANOS.get(unit.to_lowercase().as_str())?
    };

    Some((magnitude * factor) as i64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bare_number_defaults_to_milliseconds() {
        assert_eq!(parse_duration_nanos("5"), Some(5 * NANOS_PER_MILLI as i64));
    }

    #[test]
    fn test_seconds_suffix() {
        assert_eq!(parse_duration_nanos("10s"), Some(10 * NANOS_PER_SECOND as i64));
    }

    #[test]
    fn test_minutes_word_form() {
        assert_eq!(parse_duration_nanos("2 minutes"), Some(2 * NANOS_PER_MINUTE as i64));
    }

    #[test]
    fn test_fractional_hours() {
        assert_eq!(parse_duration_nanos("1.5h"), Some((1.5 * NANOS_PER_HOUR) as i64));
    }

    #[test]
    fn test_unknown_unit_returns_none() {
        assert_eq!(parse_duration_nanos("5 furlongs"), None);
    }

    #[test]
    fn test_months_approximation() {
        assert_eq!(parse_duration_nanos("1mo"), Some(NANOS_PER_MONTH as i64));
    }
}
