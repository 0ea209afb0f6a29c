//! Lenient numeric parsing of query-string fields
//!
//! Tracking clients send every field as text. Whether a bad value is
//! zero-filled or refused is decided by `ParsePolicy`; either way the outcome
//! is explicit so callers can log and count it.

use serde::Serialize;
use std::str::FromStr;

/// Result of parsing one raw field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParseOutcome<T> {
    /// Field present and well formed.
    Ok(T),
    /// Field missing, empty, or malformed under the lenient policy; zero is used.
    Defaulted,
    /// Field malformed under the strict policy.
    Rejected,
}

impl<T: Default + Copy> ParseOutcome<T> {
    /// The parsed value, or zero for anything but `Ok`.
    pub fn value(&self) -> T {
        match self {
            ParseOutcome::Ok(v) => *v,
            ParseOutcome::Defaulted | ParseOutcome::Rejected => T::default(),
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, ParseOutcome::Defaulted)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ParseOutcome::Rejected)
    }
}

/// What to do with a field that is present but not a usable number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    /// Substitute zero and carry on.
    #[default]
    Lenient,
    /// Refuse the whole update.
    Strict,
}

impl ParsePolicy {
    fn on_malformed<T>(self) -> ParseOutcome<T> {
        match self {
            ParsePolicy::Lenient => ParseOutcome::Defaulted,
            ParsePolicy::Strict => ParseOutcome::Rejected,
        }
    }
}

fn parse_with<T: FromStr>(
    raw: Option<&str>,
    policy: ParsePolicy,
    accept: impl Fn(&T) -> bool,
) -> ParseOutcome<T> {
    let raw = match raw {
        None | Some("") => return ParseOutcome::Defaulted,
        Some(raw) => raw,
    };

    match raw.parse::<T>() {
        Ok(v) if accept(&v) => ParseOutcome::Ok(v),
        _ => policy.on_malformed(),
    }
}

/// Parse a float field. `NaN` and infinities count as malformed.
pub fn parse_f64(raw: Option<&str>, policy: ParsePolicy) -> ParseOutcome<f64> {
    parse_with(raw, policy, |v: &f64| v.is_finite())
}

/// Parse an unsigned integer field.
pub fn parse_u64(raw: Option<&str>, policy: ParsePolicy) -> ParseOutcome<u64> {
    parse_with(raw, policy, |_| true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_values() {
        assert_eq!(parse_f64(Some("52.5"), ParsePolicy::Lenient), ParseOutcome::Ok(52.5));
        assert_eq!(parse_f64(Some("-0.25"), ParsePolicy::Strict), ParseOutcome::Ok(-0.25));
        assert_eq!(parse_f64(Some("1e3"), ParsePolicy::Strict), ParseOutcome::Ok(1000.0));
        assert_eq!(
            parse_u64(Some("1708123456789"), ParsePolicy::Strict),
            ParseOutcome::Ok(1_708_123_456_789)
        );
    }

    #[test]
    fn test_missing_defaults_under_both_policies() {
        for policy in [ParsePolicy::Lenient, ParsePolicy::Strict] {
            assert_eq!(parse_f64(None, policy), ParseOutcome::Defaulted);
            assert_eq!(parse_f64(Some(""), policy), ParseOutcome::Defaulted);
            assert_eq!(parse_u64(None, policy), ParseOutcome::Defaulted);
        }
    }

    #[test]
    fn test_malformed_follows_policy() {
        assert_eq!(parse_f64(Some("abc"), ParsePolicy::Lenient), ParseOutcome::Defaulted);
        assert_eq!(parse_f64(Some("abc"), ParsePolicy::Strict), ParseOutcome::Rejected);
        assert_eq!(parse_u64(Some("-5"), ParsePolicy::Lenient), ParseOutcome::Defaulted);
        assert_eq!(parse_u64(Some("12.5"), ParsePolicy::Strict), ParseOutcome::Rejected);
    }

    #[test]
    fn test_non_finite_is_malformed() {
        assert_eq!(parse_f64(Some("NaN"), ParsePolicy::Lenient), ParseOutcome::Defaulted);
        assert_eq!(parse_f64(Some("inf"), ParsePolicy::Strict), ParseOutcome::Rejected);
        assert_eq!(parse_f64(Some("-infinity"), ParsePolicy::Strict), ParseOutcome::Rejected);
    }

    #[test]
    fn test_value_zero_fills() {
        assert_eq!(ParseOutcome::Ok(3.5).value(), 3.5);
        assert_eq!(ParseOutcome::<f64>::Defaulted.value(), 0.0);
        assert_eq!(ParseOutcome::<u64>::Rejected.value(), 0);
        assert!(ParseOutcome::<u64>::Defaulted.is_defaulted());
        assert!(ParseOutcome::<u64>::Rejected.is_rejected());
    }
}
