//! Parsing and formatting of Kubernetes memory quantities.
//!
//! The engine only compares quantities and derives new ones (the overcommitted memory request),
//! so this is not a general arbitrary precision implementation. Values are held as `f64` which is
//! exact for every byte count a guest can reasonably have.

use std::{cmp::Ordering, fmt::Display, num::ParseFloatError, str::FromStr};

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use snafu::{ResultExt as _, Snafu, ensure};

mod suffix;

pub use suffix::*;

#[derive(Debug, PartialEq, Snafu)]
pub enum ParseQuantityError {
    #[snafu(display("input is either empty or contains non-ascii characters"))]
    InvalidFormat,

    #[snafu(display("failed to parse floating point number"))]
    InvalidFloat { source: ParseFloatError },

    #[snafu(display("failed to parse suffix"))]
    InvalidSuffix { source: ParseSuffixError },
}

/// The serialization format of a quantity, derived from its suffix.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
pub enum Format {
    /// No suffix or a power of 10 suffix like `M`.
    #[strum(serialize = "DecimalSI")]
    DecimalSi,

    /// A power of 2 suffix like `Mi`.
    #[strum(serialize = "BinarySI")]
    BinarySi,

    /// Scientific notation like `1e6`.
    #[strum(serialize = "DecimalExponent")]
    DecimalExponent,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantity {
    /// The numeric value as written, before the suffix is applied.
    value: f64,

    suffix: Option<Suffix>,
}

impl FromStr for Quantity {
    type Err = ParseQuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        ensure!(!input.is_empty() && input.is_ascii(), InvalidFormatSnafu);

        let number_start = usize::from(input.starts_with(['+', '-']));
        let suffix_index = input[number_start..]
            .find(|c: char| c != '.' && !c.is_ascii_digit())
            .map(|index| index + number_start);

        match suffix_index {
            Some(suffix_index) => {
                let (value, suffix) = input.split_at(suffix_index);
                let value = f64::from_str(value).context(InvalidFloatSnafu)?;
                let suffix = Suffix::from_str(suffix).context(InvalidSuffixSnafu)?;

                Ok(Self {
                    value,
                    suffix: Some(suffix),
                })
            }
            None => {
                let value = f64::from_str(input).context(InvalidFloatSnafu)?;
                Ok(Self {
                    value,
                    suffix: None,
                })
            }
        }
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.suffix {
            Some(suffix) => write!(f, "{value}{suffix}", value = self.value),
            None => write!(f, "{value}", value = self.value),
        }
    }
}

impl TryFrom<&K8sQuantity> for Quantity {
    type Error = ParseQuantityError;

    fn try_from(value: &K8sQuantity) -> Result<Self, Self::Error> {
        Self::from_str(&value.0)
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.base_value().partial_cmp(&other.base_value())
    }
}

impl Quantity {
    pub fn format(&self) -> Format {
        match self.suffix {
            Some(Suffix::BinaryMultiple(_)) => Format::BinarySi,
            Some(Suffix::DecimalExponent(_)) => Format::DecimalExponent,
            Some(Suffix::DecimalMultiple(_)) | None => Format::DecimalSi,
        }
    }

    /// The value with its suffix applied, e.g. `1Ki` is `1024.0`.
    pub fn base_value(&self) -> f64 {
        self.value * self.suffix.map_or(1.0, |suffix| suffix.factor())
    }

    /// The integer value, rounded up for fractional amounts.
    pub fn to_int_value(&self) -> i64 {
        self.base_value().ceil() as i64
    }

    /// Formats the integer amount `value` in the canonical spelling of `format`.
    ///
    /// This picks the largest suffix that keeps an integer mantissa, so 536870912 is rendered as
    /// `512Mi` in [`Format::BinarySi`] and 435200000 as `435200k` in [`Format::DecimalSi`]. Binary
    /// amounts strictly between -1024 and 1024 are rendered as decimal.
    pub fn from_int_value(value: i64, format: Format) -> K8sQuantity {
        if value == 0 {
            return K8sQuantity("0".to_owned());
        }

        let rendered = match format {
            Format::BinarySi if value.unsigned_abs() >= 1024 => {
                let (mantissa, power) = remove_factors(value, 1024, BinaryMultiple::ALL.len());
                match power.checked_sub(1).map(|index| BinaryMultiple::ALL[index]) {
                    Some(multiple) => format!("{mantissa}{multiple}"),
                    None => mantissa.to_string(),
                }
            }
            Format::BinarySi | Format::DecimalSi => {
                let (mantissa, power) = remove_thousands(value);
                match DecimalMultiple::from_thousands(power as u32) {
                    Some(multiple) => format!("{mantissa}{multiple}"),
                    None => mantissa.to_string(),
                }
            }
            Format::DecimalExponent => match remove_thousands(value) {
                (mantissa, 0) => mantissa.to_string(),
                (mantissa, power) => format!("{mantissa}e{exponent}", exponent = power * 3),
            },
        };

        K8sQuantity(rendered)
    }
}

/// Divides `value` by `base` while it stays an integer, at most `limit` times.
fn remove_factors(mut value: i64, base: i64, limit: usize) -> (i64, usize) {
    let mut power = 0;
    while power < limit && value % base == 0 {
        value /= base;
        power += 1;
    }
    (value, power)
}

fn remove_thousands(value: i64) -> (i64, usize) {
    remove_factors(value, 1000, 6)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("512Mi", 536_870_912.0, Format::BinarySi)]
    #[case("1Gi", 1_073_741_824.0, Format::BinarySi)]
    #[case("512M", 512_000_000.0, Format::DecimalSi)]
    #[case("1.5G", 1_500_000_000.0, Format::DecimalSi)]
    #[case("128974848", 128_974_848.0, Format::DecimalSi)]
    #[case("1e3", 1000.0, Format::DecimalExponent)]
    #[case("-2Ki", -2048.0, Format::BinarySi)]
    #[case("0", 0.0, Format::DecimalSi)]
    fn parse_quantity(#[case] input: &str, #[case] base_value: f64, #[case] format: Format) {
        let parsed = Quantity::from_str(input).unwrap();
        assert_eq!(parsed.base_value(), base_value);
        assert_eq!(parsed.format(), format);
    }

    #[rstest]
    #[case("")]
    #[case("Mi")]
    #[case("12ZZ")]
    #[case("1.2.3Gi")]
    fn parse_invalid_quantity(#[case] input: &str) {
        assert!(Quantity::from_str(input).is_err());
    }

    #[rstest]
    #[case(536_870_912, Format::BinarySi, "512Mi")]
    #[case(456_340_275, Format::BinarySi, "456340275")]
    #[case(1023, Format::BinarySi, "1023")]
    #[case(2048, Format::BinarySi, "2Ki")]
    #[case(435_200_000, Format::DecimalSi, "435200k")]
    #[case(512_000_000, Format::DecimalSi, "512M")]
    #[case(1_234, Format::DecimalSi, "1234")]
    #[case(435_200_000, Format::DecimalExponent, "435200e3")]
    #[case(0, Format::BinarySi, "0")]
    fn format_int_value(#[case] value: i64, #[case] format: Format, #[case] expected: &str) {
        assert_eq!(Quantity::from_int_value(value, format).0, expected);
    }

    #[test]
    fn compare_across_formats() {
        let binary = Quantity::from_str("1Gi").unwrap();
        let decimal = Quantity::from_str("1G").unwrap();
        assert!(decimal < binary);

        let bytes = Quantity::from_str("1024").unwrap();
        let kibi = Quantity::from_str("1Ki").unwrap();
        assert_eq!(bytes.partial_cmp(&kibi), Some(Ordering::Equal));
    }

    #[test]
    fn fractional_values_round_up() {
        assert_eq!(Quantity::from_str("1.5").unwrap().to_int_value(), 2);
        assert_eq!(Quantity::from_str("0.5Ki").unwrap().to_int_value(), 512);
    }
}
