use std::{fmt::Display, str::FromStr};

use snafu::Snafu;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(display("failed to parse {input:?} as quantity suffix"))]
pub struct ParseSuffixError {
    input: String,
}

/// The suffix of a quantity, as defined by the [Kubernetes serialization format][k8s-serialization-format].
///
/// [k8s-serialization-format]: https://github.com/kubernetes/apimachinery/blob/8c60292e48e46c4faa1e92acb232ce6adb37512c/pkg/api/resource/quantity.go#L37-L59
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Suffix {
    DecimalMultiple(DecimalMultiple),
    BinaryMultiple(BinaryMultiple),
    DecimalExponent(i32),
}

impl FromStr for Suffix {
    type Err = ParseSuffixError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Ok(binary) = BinaryMultiple::from_str(input) {
            return Ok(Self::BinaryMultiple(binary));
        }

        if let Ok(decimal) = DecimalMultiple::from_str(input) {
            return Ok(Self::DecimalMultiple(decimal));
        }

        if let Some(exponent) = input.strip_prefix(['e', 'E']) {
            if let Ok(exponent) = i32::from_str(exponent) {
                return Ok(Self::DecimalExponent(exponent));
            }
        }

        ParseSuffixSnafu { input }.fail()
    }
}

impl Display for Suffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DecimalMultiple(decimal) => write!(f, "{decimal}"),
            Self::BinaryMultiple(binary) => write!(f, "{binary}"),
            Self::DecimalExponent(exponent) => write!(f, "e{exponent}"),
        }
    }
}

impl Suffix {
    pub fn factor(&self) -> f64 {
        match self {
            Self::DecimalMultiple(decimal) => decimal.factor(),
            Self::BinaryMultiple(binary) => binary.factor(),
            Self::DecimalExponent(exponent) => 10f64.powi(*exponent),
        }
    }
}

/// Byte multiples based on powers of 2.
///
/// ```plain
/// - 1024^1, KiB (Ki), Kibibyte
/// - 1024^2, MiB (Mi), Mebibyte
/// - 1024^3, GiB (Gi), Gibibyte
/// - 1024^4, TiB (Ti), Tebibyte
/// - 1024^5, PiB (Pi), Pebibyte
/// - 1024^6, EiB (Ei), Exbibyte
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, strum::Display, strum::EnumString)]
pub enum BinaryMultiple {
    #[strum(serialize = "Ki")]
    Kibi,

    #[strum(serialize = "Mi")]
    Mebi,

    #[strum(serialize = "Gi")]
    Gibi,

    #[strum(serialize = "Ti")]
    Tebi,

    #[strum(serialize = "Pi")]
    Pebi,

    #[strum(serialize = "Ei")]
    Exbi,
}

impl BinaryMultiple {
    /// All multiples, smallest first. The position plus one is the power of 1024.
    pub const ALL: [Self; 6] = [
        Self::Kibi,
        Self::Mebi,
        Self::Gibi,
        Self::Tebi,
        Self::Pebi,
        Self::Exbi,
    ];

    pub fn exponent(&self) -> i32 {
        match self {
            Self::Kibi => 1,
            Self::Mebi => 2,
            Self::Gibi => 3,
            Self::Tebi => 4,
            Self::Pebi => 5,
            Self::Exbi => 6,
        }
    }

    pub fn factor(&self) -> f64 {
        1024f64.powi(self.exponent())
    }
}

/// Multiples based on powers of 10.
///
/// Kubernetes uses a lower case `k` for kilo, and additionally accepts the sub-unit multiples
/// `n`, `u` and `m`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, strum::Display, strum::EnumString)]
pub enum DecimalMultiple {
    #[strum(serialize = "n")]
    Nano,

    #[strum(serialize = "u")]
    Micro,

    #[strum(serialize = "m")]
    Milli,

    #[strum(serialize = "k")]
    Kilo,

    #[strum(serialize = "M")]
    Mega,

    #[strum(serialize = "G")]
    Giga,

    #[strum(serialize = "T")]
    Tera,

    #[strum(serialize = "P")]
    Peta,

    #[strum(serialize = "E")]
    Exa,
}

impl DecimalMultiple {
    /// Looks up the multiple for a power of 1000, `0` having no suffix.
    pub fn from_thousands(power: u32) -> Option<Self> {
        match power {
            1 => Some(Self::Kilo),
            2 => Some(Self::Mega),
            3 => Some(Self::Giga),
            4 => Some(Self::Tera),
            5 => Some(Self::Peta),
            6 => Some(Self::Exa),
            _ => None,
        }
    }

    pub fn exponent(&self) -> i32 {
        match self {
            Self::Nano => -9,
            Self::Micro => -6,
            Self::Milli => -3,
            Self::Kilo => 3,
            Self::Mega => 6,
            Self::Giga => 9,
            Self::Tera => 12,
            Self::Peta => 15,
            Self::Exa => 18,
        }
    }

    pub fn factor(&self) -> f64 {
        10f64.powi(self.exponent())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Ki", Suffix::BinaryMultiple(BinaryMultiple::Kibi))]
    #[case("Gi", Suffix::BinaryMultiple(BinaryMultiple::Gibi))]
    #[case("k", Suffix::DecimalMultiple(DecimalMultiple::Kilo))]
    #[case("m", Suffix::DecimalMultiple(DecimalMultiple::Milli))]
    #[case("E", Suffix::DecimalMultiple(DecimalMultiple::Exa))]
    #[case("e3", Suffix::DecimalExponent(3))]
    #[case("E-2", Suffix::DecimalExponent(-2))]
    fn parse_suffix(#[case] input: &str, #[case] expected: Suffix) {
        assert_eq!(Suffix::from_str(input), Ok(expected));
    }

    #[rstest]
    #[case("K")]
    #[case("KiB")]
    #[case("e")]
    fn parse_invalid_suffix(#[case] input: &str) {
        assert!(Suffix::from_str(input).is_err());
    }
}
