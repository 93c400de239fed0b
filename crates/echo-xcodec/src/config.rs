// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Immutable engine settings and their builder.

use crate::error::{CodecError, Result};

/// Default bound on value nesting.
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// Resolved engine configuration.
///
/// Both peers must agree on `xlang`, `track_ref` and `compatible`; the frame
/// header only carries `xlang`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    xlang: bool,
    track_ref: bool,
    compatible: bool,
    check_struct_version: bool,
    max_depth: u32,
    canonicalize: bool,
    canonical_cache_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            xlang: true,
            track_ref: false,
            compatible: false,
            check_struct_version: false,
            max_depth: DEFAULT_MAX_DEPTH,
            canonicalize: true,
            canonical_cache_limit: None,
        }
    }
}

impl Config {
    /// Start a builder from the defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Cross-language wire format.
    pub fn xlang(&self) -> bool {
        self.xlang
    }

    /// Identity tracking for shared and cyclic references.
    pub fn track_ref(&self) -> bool {
        self.track_ref
    }

    /// Schema-evolution mode: struct schemas travel on the wire.
    pub fn compatible(&self) -> bool {
        self.compatible
    }

    /// Prefix schema-consistent structs with a layout hash.
    pub fn check_struct_version(&self) -> bool {
        self.check_struct_version && !self.compatible
    }

    /// Maximum nesting depth on write and read.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Merge byte-identical immutable collection elements on read.
    pub fn canonicalize(&self) -> bool {
        self.canonicalize
    }

    /// Bound on canonical cache entries per frame (`None` = unbounded).
    pub fn canonical_cache_limit(&self) -> Option<usize> {
        self.canonical_cache_limit
    }
}

/// Fluent builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the cross-language flag.
    pub fn xlang(mut self, on: bool) -> Self {
        self.config.xlang = on;
        self
    }

    /// Enable identity tracking.
    pub fn track_ref(mut self, on: bool) -> Self {
        self.config.track_ref = on;
        self
    }

    /// Enable compatible (schema-evolution) mode.
    pub fn compatible(mut self, on: bool) -> Self {
        self.config.compatible = on;
        self
    }

    /// Enable struct layout hashing in schema-consistent mode.
    pub fn check_struct_version(mut self, on: bool) -> Self {
        self.config.check_struct_version = on;
        self
    }

    /// Bound value nesting.
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Toggle canonicalization of untracked immutable elements.
    pub fn canonicalize(mut self, on: bool) -> Self {
        self.config.canonicalize = on;
        self
    }

    /// Cap the canonical cache; lookups continue once the cap is reached.
    pub fn canonical_cache_limit(mut self, limit: Option<usize>) -> Self {
        self.config.canonical_cache_limit = limit;
        self
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<Config> {
        if self.config.max_depth == 0 {
            return Err(CodecError::InvalidConfig("max_depth must be at least 1"));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.xlang());
        assert!(!config.track_ref());
        assert!(!config.compatible());
        assert_eq!(config.max_depth(), DEFAULT_MAX_DEPTH);
        assert!(config.canonicalize());
        assert_eq!(config.canonical_cache_limit(), None);
    }

    #[test]
    fn builder_validates_depth() {
        assert!(Config::builder().max_depth(0).build().is_err());
        let config = Config::builder()
            .track_ref(true)
            .compatible(true)
            .check_struct_version(true)
            .canonical_cache_limit(Some(16))
            .build()
            .unwrap();
        assert!(config.track_ref());
        // version hashing only applies to schema-consistent mode
        assert!(!config.check_struct_version());
        assert_eq!(config.canonical_cache_limit(), Some(16));
    }
}
