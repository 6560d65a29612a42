// src/api.rs

//! Buildpack API version gate
//!
//! Plan normalization rules changed at API 0.3: top-level `version`
//! keys on requirements were deprecated in favor of
//! `metadata.version`. The gate is a closed variant so callers
//! dispatch on it instead of comparing strings in hot paths.

use std::fmt;

/// Supported buildpack API generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildpackApi {
    /// API 0.2 and earlier: `version` and `metadata.version` may
    /// coexist when they agree
    #[default]
    V0_2,
    /// API 0.3 and later: `metadata.version` only; a bare `version`
    /// is deprecated
    V0_3,
}

impl BuildpackApi {
    /// Parse an API string such as "0.2" or "0.3"
    ///
    /// Unparsable strings fall back to the legacy gate, matching how
    /// descriptors written before the API field was mandatory behave.
    pub fn parse(s: &str) -> Self {
        let mut parts = s.trim().splitn(2, '.');
        let major: u32 = match parts.next().and_then(|p| p.parse().ok()) {
            Some(n) => n,
            None => return Self::V0_2,
        };
        let minor: u32 = parts
            .next()
            .map(|p| {
                p.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
            })
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);

        if major == 0 && minor < 3 {
            Self::V0_2
        } else {
            Self::V0_3
        }
    }

    /// Whether top-level `version` keys on requirements are deprecated
    pub fn deprecates_top_level_version(&self) -> bool {
        matches!(self, Self::V0_3)
    }
}

impl fmt::Display for BuildpackApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V0_2 => write!(f, "0.2"),
            Self::V0_3 => write!(f, "0.3"),
        }
    }
}
