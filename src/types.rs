//! Core identifier and enum types shared by the store, queries, generation
//! and state import/export.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Big-endian key bytes; tree order equals id order.
            pub fn to_key(self) -> [u8; 8] {
                self.0.to_be_bytes()
            }

            pub fn from_key(bytes: &[u8]) -> Option<Self> {
                let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
                Some(Self(u64::from_be_bytes(raw)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

row_id!(
    /// Loaded catalog package.
    PackageId
);
row_id!(
    /// User session (one per window/tab).
    SessionId
);
row_id!(EndpointTypeId);
row_id!(EndpointId);
row_id!(
    /// Identity of a cluster/attribute/command state row. Stable across
    /// insert-or-replace of the same (endpoint type, item, side) key.
    StateRowId
);
row_id!(ClusterId);
row_id!(AttributeId);
row_id!(CommandId);
row_id!(DeviceTypeId);

/// Role a cluster, attribute or command plays on an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    #[serde(alias = "client")]
    Client,
    #[serde(alias = "server")]
    Server,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Client => "CLIENT",
            Side::Server => "SERVER",
        }
    }

    pub(crate) fn key_byte(self) -> u8 {
        match self {
            Side::Client => 0,
            Side::Server => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(Side::Client),
            "server" => Ok(Side::Server),
            other => Err(format!("Invalid side: {} (must be 'client' or 'server')", other)),
        }
    }
}

/// Package type tag as written to the state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageType {
    #[serde(rename = "spec-properties")]
    SpecProperties,
    #[serde(rename = "gen-templates-json")]
    GenTemplatesJson,
    #[serde(rename = "gen-template")]
    GenTemplate,
}

impl PackageType {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageType::SpecProperties => "spec-properties",
            PackageType::GenTemplatesJson => "gen-templates-json",
            PackageType::GenTemplate => "gen-template",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spec-properties" => Ok(PackageType::SpecProperties),
            "gen-templates-json" => Ok(PackageType::GenTemplatesJson),
            "gen-template" => Ok(PackageType::GenTemplate),
            other => Err(format!("Unknown package type: {}", other)),
        }
    }
}

/// Default profile id for endpoints (Home Automation).
pub const DEFAULT_PROFILE_ID: u16 = 0x0104;

/// Format a protocol code the way templates and exports show it: `0x0006`.
pub fn hex_code(code: u32) -> String {
    format!("0x{:04X}", code)
}

/// Parse `0x0006`, `0X6` or `6`.
pub fn parse_code(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => trimmed.parse::<u32>(),
    };
    parsed.map_err(|e| format!("Invalid code '{}': {}", s, e))
}
