//! Origin registry.
//!
//! An origin is one upstream marketplace: a source to fetch from, a mapper
//! for its records, and the keys its announcements are signed with. The
//! engine and scheduler treat every origin the same way.

use std::sync::Arc;
use std::time::Duration;

use nostr_sdk::Keys;

use crate::mapper::{HodlHodlMapper, PeachMapper, RecordMapper};
use crate::source::{
    HodlHodlConfig, HodlHodlSource, HttpConfig, ListingSource, PeachConfig, PeachSource,
};
use crate::{Error, Result};

/// Names of the origins this crate ships adapters for.
pub const BUILTIN_ORIGINS: &[&str] = &["hodlhodl", "peach"];

/// One upstream marketplace.
#[derive(Clone)]
pub struct Origin {
    pub name: String,
    pub keys: Keys,
    pub source: Arc<dyn ListingSource>,
    pub mapper: Arc<dyn RecordMapper>,
}

impl Origin {
    /// Assemble an origin, checking that source and mapper agree on its name.
    pub fn new(
        keys: Keys,
        source: Arc<dyn ListingSource>,
        mapper: Arc<dyn RecordMapper>,
    ) -> Result<Self> {
        if source.origin() != mapper.origin() {
            return Err(Error::Config(format!(
                "source '{}' paired with mapper '{}'",
                source.origin(),
                mapper.origin()
            )));
        }

        Ok(Self {
            name: source.origin().to_string(),
            keys,
            source,
            mapper,
        })
    }

    /// Build one of the [`BUILTIN_ORIGINS`] with default endpoints.
    pub fn builtin(
        name: &str,
        keys: Keys,
        http: &HttpConfig,
        expiration: Duration,
    ) -> Result<Self> {
        match name {
            "hodlhodl" => Self::new(
                keys,
                Arc::new(HodlHodlSource::new(HodlHodlConfig::default(), http)?),
                Arc::new(HodlHodlMapper::new(expiration)),
            ),
            "peach" => Self::new(
                keys,
                Arc::new(PeachSource::new(PeachConfig::default(), http)?),
                Arc::new(PeachMapper::new(expiration)),
            ),
            other => Err(Error::Config(format!("unknown origin '{}'", other))),
        }
    }
}

impl std::fmt::Debug for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Origin")
            .field("name", &self.name)
            .field("pubkey", &self.keys.public_key().to_hex())
            .finish()
    }
}

/// The set of enabled origins, in registration order.
#[derive(Debug, Clone, Default)]
pub struct OriginRegistry {
    origins: Vec<Origin>,
}

impl OriginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an origin. Names must be unique.
    pub fn register(&mut self, origin: Origin) -> Result<()> {
        if self.get(&origin.name).is_some() {
            return Err(Error::Config(format!(
                "origin '{}' registered twice",
                origin.name
            )));
        }
        self.origins.push(origin);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Origin> {
        self.origins.iter().find(|o| o.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Origin> {
        self.origins.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.origins.iter().map(|o| o.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}
