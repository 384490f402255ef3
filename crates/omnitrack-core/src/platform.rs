//! The closed set of supported delivery platforms.

use serde::{Deserialize, Serialize};

/// Every delivery platform the system can aggregate.
///
/// Closed enumeration: adding a platform means adding a variant here, an
/// adapter in `omnitrack-adapters`, and a status table. Nothing else in the
/// system branches on platform identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Doordash,
    UberEats,
    Grubhub,
    Instacart,
    Shipt,
    Amazon,
    AmazonFresh,
    Costco,
    SamsClub,
    Drizly,
    Saucey,
}

/// Broad order category, used by the ETA engine's per-category modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderCategory {
    Restaurant,
    Grocery,
    Parcel,
    Warehouse,
    Alcohol,
}

impl Platform {
    /// All platforms, in registry order.
    pub const ALL: [Platform; 11] = [
        Platform::Doordash,
        Platform::UberEats,
        Platform::Grubhub,
        Platform::Instacart,
        Platform::Shipt,
        Platform::Amazon,
        Platform::AmazonFresh,
        Platform::Costco,
        Platform::SamsClub,
        Platform::Drizly,
        Platform::Saucey,
    ];

    /// Two-letter prefix used in derived delivery ids (e.g. `dd_8842`).
    #[must_use]
    pub fn id_prefix(self) -> &'static str {
        match self {
            Platform::Doordash => "dd",
            Platform::UberEats => "ue",
            Platform::Grubhub => "gh",
            Platform::Instacart => "ic",
            Platform::Shipt => "sh",
            Platform::Amazon => "am",
            Platform::AmazonFresh => "af",
            Platform::Costco => "cc",
            Platform::SamsClub => "sc",
            Platform::Drizly => "dz",
            Platform::Saucey => "sy",
        }
    }

    /// Stable wire identifier (matches the serde representation).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Doordash => "doordash",
            Platform::UberEats => "uber_eats",
            Platform::Grubhub => "grubhub",
            Platform::Instacart => "instacart",
            Platform::Shipt => "shipt",
            Platform::Amazon => "amazon",
            Platform::AmazonFresh => "amazon_fresh",
            Platform::Costco => "costco",
            Platform::SamsClub => "sams_club",
            Platform::Drizly => "drizly",
            Platform::Saucey => "saucey",
        }
    }

    #[must_use]
    pub fn category(self) -> OrderCategory {
        match self {
            Platform::Doordash | Platform::UberEats | Platform::Grubhub => {
                OrderCategory::Restaurant
            }
            Platform::Instacart | Platform::Shipt | Platform::AmazonFresh => OrderCategory::Grocery,
            Platform::Amazon => OrderCategory::Parcel,
            Platform::Costco | Platform::SamsClub => OrderCategory::Warehouse,
            Platform::Drizly | Platform::Saucey => OrderCategory::Alcohol,
        }
    }

    /// The courier network that actually fulfils orders for this platform,
    /// when it is not the platform's own. Costco delivery rides the Instacart
    /// network; Sam's Club rides Shipt.
    #[must_use]
    pub fn fulfilled_by(self) -> Option<Platform> {
        match self {
            Platform::Costco => Some(Platform::Instacart),
            Platform::SamsClub => Some(Platform::Shipt),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown platform: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_unique() {
        let mut prefixes: Vec<&str> = Platform::ALL.iter().map(|p| p.id_prefix()).collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        assert_eq!(prefixes.len(), Platform::ALL.len());
    }

    #[test]
    fn from_str_round_trips_every_platform() {
        for platform in Platform::ALL {
            let parsed: Platform = platform.as_str().parse().unwrap();
            assert_eq!(parsed, platform);
        }
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert!("postmates".parse::<Platform>().is_err());
    }

    #[test]
    fn warehouse_clubs_are_delegate_fulfilled() {
        assert_eq!(Platform::Costco.fulfilled_by(), Some(Platform::Instacart));
        assert_eq!(Platform::SamsClub.fulfilled_by(), Some(Platform::Shipt));
        assert_eq!(Platform::Doordash.fulfilled_by(), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Platform::AmazonFresh).unwrap();
        assert_eq!(json, "\"amazon_fresh\"");
    }
}
