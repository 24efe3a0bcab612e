use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// How user records are keyed in the world state.
///
/// The two schemes give the stored key a different meaning, so a deployment
/// picks exactly one and keeps it for the lifetime of its ledger.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyingScheme {
    /// Synthetic `USER<i>` keys chosen by the caller. Plain lookups and
    /// ownership transfer are available.
    #[default]
    Index,
    /// Records live under their own `nameHash`. Lookups verify the supplied
    /// hashes instead of returning the record.
    NameHash,
}

impl KeyingScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyingScheme::Index => "index",
            KeyingScheme::NameHash => "hash",
        }
    }
}

impl fmt::Display for KeyingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown keying scheme {0:?} (expected \"index\" or \"hash\")")]
pub struct UnknownKeyingScheme(String);

impl FromStr for KeyingScheme {
    type Err = UnknownKeyingScheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index" => Ok(KeyingScheme::Index),
            "hash" | "name-hash" | "name_hash" => Ok(KeyingScheme::NameHash),
            other => Err(UnknownKeyingScheme(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChaincodeConfig {
    pub keying: KeyingScheme,
}

impl ChaincodeConfig {
    pub fn new(keying: KeyingScheme) -> Self {
        Self { keying }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keying_scheme_parses_cli_spellings() {
        assert_eq!("index".parse::<KeyingScheme>().unwrap(), KeyingScheme::Index);
        assert_eq!("HASH".parse::<KeyingScheme>().unwrap(), KeyingScheme::NameHash);
        assert_eq!(
            " name-hash ".parse::<KeyingScheme>().unwrap(),
            KeyingScheme::NameHash
        );
        assert!("sequential".parse::<KeyingScheme>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for scheme in [KeyingScheme::Index, KeyingScheme::NameHash] {
            assert_eq!(scheme.to_string().parse::<KeyingScheme>().unwrap(), scheme);
        }
    }

    #[test]
    fn default_config_uses_index_keys() {
        assert_eq!(ChaincodeConfig::default().keying, KeyingScheme::Index);
    }
}
