use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ValidationError;

/// Upstream providers, in fallback priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    YahooFinance,
    AlphaVantage,
}

impl SourceId {
    pub const ALL: [Self; 2] = [Self::YahooFinance, Self::AlphaVantage];

    /// Persisted `source` key.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::YahooFinance => "yahoo_finance",
            Self::AlphaVantage => "alpha_vantage",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::YahooFinance => "Yahoo Finance chart and quoteSummary endpoints",
            Self::AlphaVantage => "Alpha Vantage GLOBAL_QUOTE and OVERVIEW endpoints",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yahoo_finance" | "yahoo" => Ok(Self::YahooFinance),
            "alpha_vantage" | "alphavantage" => Ok(Self::AlphaVantage),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}

/// Provenance tag carried by every record and dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    Live(SourceId),
    Cache,
    Snapshot,
    Synthetic,
}

impl DataSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live(source) => source.as_str(),
            Self::Cache => "cache",
            Self::Snapshot => "snapshot",
            Self::Synthetic => "synthetic",
        }
    }

    pub const fn tier(self) -> Tier {
        match self {
            Self::Live(_) => Tier::Live,
            Self::Cache => Tier::Cache,
            Self::Snapshot => Tier::Snapshot,
            Self::Synthetic => Tier::Synthetic,
        }
    }
}

impl Display for DataSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cache" => Ok(Self::Cache),
            "snapshot" => Ok(Self::Snapshot),
            "synthetic" => Ok(Self::Synthetic),
            other => other.parse::<SourceId>().map(Self::Live),
        }
    }
}

impl Serialize for DataSource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(D::Error::custom)
    }
}

/// Stage of the fallback chain that produced a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Live,
    Cache,
    Snapshot,
    Synthetic,
}

impl Tier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cache => "cache",
            Self::Snapshot => "snapshot",
            Self::Synthetic => "synthetic",
        }
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
