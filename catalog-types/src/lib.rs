use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

pub mod attribute;
pub mod category;
pub mod error;
pub mod matching;

pub use error::CatalogError;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    #[display("trendyol")]
    Trendyol,
    #[display("hepsiburada")]
    Hepsiburada,
    #[display("temu")]
    Temu,
}

impl Marketplace {
    pub const ALL: [Marketplace; 3] = [Self::Trendyol, Self::Hepsiburada, Self::Temu];

    /// Prefix of the environment variables configuring this marketplace.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Trendyol => "TRENDYOL",
            Self::Hepsiburada => "HEPSIBURADA",
            Self::Temu => "TEMU",
        }
    }
}

#[derive(Debug, Display, Error)]
#[display("Unknown marketplace {_0}")]
pub struct UnknownMarketplace(#[error(not(source))] pub String);

impl FromStr for Marketplace {
    type Err = UnknownMarketplace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trendyol" => Ok(Self::Trendyol),
            "hepsiburada" => Ok(Self::Hepsiburada),
            "temu" => Ok(Self::Temu),
            other => Err(UnknownMarketplace(other.to_string())),
        }
    }
}

/// Marketplace-native identifier. Upstream APIs mix numeric and textual ids,
/// sometimes for the same entity, so canonical numeric strings are stored as
/// numbers. Strings with leading zeros stay textual.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum MarketplaceId {
    #[display("{_0}")]
    Numeric(u64),
    #[display("{_0}")]
    Text(String),
}

pub type CategoryId = MarketplaceId;
pub type AttributeId = MarketplaceId;

impl MarketplaceId {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Numeric(_) => false,
            Self::Text(s) => s.trim().is_empty(),
        }
    }

    /// Flat upstream lists use `0` or an empty string as "no parent".
    pub fn is_root_marker(&self) -> bool {
        match self {
            Self::Numeric(n) => *n == 0,
            Self::Text(s) => s.trim().is_empty(),
        }
    }
}

impl From<u64> for MarketplaceId {
    fn from(id: u64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for MarketplaceId {
    fn from(id: &str) -> Self {
        let id = id.trim();
        let canonical = id.bytes().all(|b| b.is_ascii_digit()) && (id == "0" || !id.starts_with('0'));
        match id.parse::<u64>() {
            Ok(n) if canonical => Self::Numeric(n),
            _ => Self::Text(id.to_string()),
        }
    }
}

impl From<String> for MarketplaceId {
    fn from(id: String) -> Self {
        Self::from(id.as_str())
    }
}

impl FromStr for MarketplaceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl Ord for MarketplaceId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for MarketplaceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for MarketplaceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Numeric(n) => serializer.serialize_u64(*n),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for MarketplaceId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StrOrNum {
            Num(u64),
            Str(String),
        }

        Ok(match StrOrNum::deserialize(deserializer)? {
            StrOrNum::Num(n) => Self::Numeric(n),
            StrOrNum::Str(s) => Self::from(s),
        })
    }
}

pub fn parse_duration(duration: &str) -> Result<std::time::Duration, String> {
    let duration = duration
        .trim()
        .to_lowercase()
        .replace(' ', "")
        .replace("saniye", "s")
        .replace("sn", "s")
        .replace("dakika", "m")
        .replace("dk", "m")
        .replace("saat", "h")
        .replace("gün", "d")
        .replace("gun", "d");
    duration_str::parse(&duration).map_err(|err| format!("Unable to parse duration {duration}: {err}"))
}
