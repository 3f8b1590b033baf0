//! String enums of the CPU preference that tolerate unknown values.
//!
//! Unknown values are kept verbatim so that admission can reject them by name instead of failing
//! to decode the whole object.

use std::{borrow::Cow, fmt::Display, str::FromStr};

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! string_enum_impls {
    ($name:ident) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Self::from_str(&value).map_err(serde::de::Error::custom)
            }
        }

        impl JsonSchema for $name {
            fn schema_name() -> Cow<'static, str> {
                stringify!($name).into()
            }

            fn json_schema(generator: &mut SchemaGenerator) -> Schema {
                String::json_schema(generator)
            }
        }
    };
}

/// How the vCPUs of an instance type are laid out across sockets, cores and threads.
#[derive(Clone, Debug, Default, Eq, PartialEq, strum::EnumString)]
pub enum PreferredCpuTopology {
    #[default]
    #[strum(serialize = "sockets")]
    Sockets,

    #[strum(serialize = "cores")]
    Cores,

    #[strum(serialize = "threads")]
    Threads,

    #[strum(serialize = "spread")]
    Spread,

    #[strum(serialize = "any")]
    Any,

    #[strum(serialize = "preferSockets")]
    DeprecatedPreferSockets,

    #[strum(serialize = "preferCores")]
    DeprecatedPreferCores,

    #[strum(serialize = "preferThreads")]
    DeprecatedPreferThreads,

    #[strum(serialize = "preferSpread")]
    DeprecatedPreferSpread,

    #[strum(serialize = "preferAny")]
    DeprecatedPreferAny,

    #[strum(default)]
    Unknown(String),
}

string_enum_impls!(PreferredCpuTopology);

impl PreferredCpuTopology {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sockets => "sockets",
            Self::Cores => "cores",
            Self::Threads => "threads",
            Self::Spread => "spread",
            Self::Any => "any",
            Self::DeprecatedPreferSockets => "preferSockets",
            Self::DeprecatedPreferCores => "preferCores",
            Self::DeprecatedPreferThreads => "preferThreads",
            Self::DeprecatedPreferSpread => "preferSpread",
            Self::DeprecatedPreferAny => "preferAny",
            Self::Unknown(value) => value,
        }
    }

    /// Maps the legacy `prefer*` spellings onto their current equivalents.
    ///
    /// Returns [`None`] for current spellings and unknown values.
    pub fn replacement(&self) -> Option<Self> {
        match self {
            Self::DeprecatedPreferSockets => Some(Self::Sockets),
            Self::DeprecatedPreferCores => Some(Self::Cores),
            Self::DeprecatedPreferThreads => Some(Self::Threads),
            Self::DeprecatedPreferSpread => Some(Self::Spread),
            Self::DeprecatedPreferAny => Some(Self::Any),
            Self::Sockets
            | Self::Cores
            | Self::Threads
            | Self::Spread
            | Self::Any
            | Self::Unknown(_) => None,
        }
    }

    /// The current spelling of this topology.
    pub fn canonical(&self) -> Self {
        self.replacement().unwrap_or_else(|| self.clone())
    }
}

/// The axes vCPUs are spread across when using [`PreferredCpuTopology::Spread`].
#[derive(Clone, Debug, Default, Eq, PartialEq, strum::EnumString)]
pub enum SpreadAcross {
    #[default]
    #[strum(serialize = "SocketsCores")]
    SocketsCores,

    #[strum(serialize = "CoresThreads")]
    CoresThreads,

    #[strum(serialize = "SocketsCoresThreads")]
    SocketsCoresThreads,

    #[strum(default)]
    Unknown(String),
}

string_enum_impls!(SpreadAcross);

impl SpreadAcross {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SocketsCores => "SocketsCores",
            Self::CoresThreads => "CoresThreads",
            Self::SocketsCoresThreads => "SocketsCoresThreads",
            Self::Unknown(value) => value,
        }
    }
}
