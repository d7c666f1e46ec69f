//! Asset and property metadata lookup.

use std::{collections::HashMap, future::Future, path::Path};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::Error;
use crate::inference::PropertyDataType;

/// Identifies one asset property a response was requested for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyKey {
    pub asset_id: String,
    pub property_id: String,
}

impl PropertyKey {
    pub fn new(asset_id: impl ToString, property_id: impl ToString) -> Self {
        PropertyKey {
            asset_id: asset_id.to_string(),
            property_id: property_id.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub asset_id: String,
    pub asset_name: String,
    pub property_id: String,
    pub property_name: String,
    #[serde(default)]
    pub data_type: Option<PropertyDataType>,
}

impl PropertyMetadata {
    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(&self.asset_id, &self.property_id)
    }
}

/// Looks up the metadata frames are named and typed by.
///
/// Implementations may do network I/O and cache; they own any retry policy.
/// The token is passed through so long lookups can stop early, but callers
/// also race the returned future against it.
pub trait Resolver {
    fn property(
        &self,
        key: &PropertyKey,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<PropertyMetadata, Error>> + Send;
}

/// Metadata file read by [`StaticResolver`].
///
/// ```toml
/// [[property]]
/// asset_id = "a-1"
/// asset_name = "Pump-1"
/// property_id = "p-1"
/// property_name = "Temperature"
/// data_type = "DOUBLE"
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FramerConfig {
    #[serde(default)]
    pub property: Vec<PropertyMetadata>,
}

impl FramerConfig {
    pub fn parse(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        debug!(?path, "reading metadata");
        Self::parse(&std::fs::read_to_string(path)?)
    }
}

/// Resolver backed by an in-memory table.
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    assets: HashMap<String, HashMap<String, PropertyMetadata>>,
}

impl StaticResolver {
    pub fn new(properties: impl IntoIterator<Item = PropertyMetadata>) -> Self {
        let mut assets: HashMap<String, HashMap<String, PropertyMetadata>> = HashMap::new();
        for property in properties {
            let PropertyKey {
                asset_id,
                property_id,
            } = property.key();
            assets
                .entry(asset_id)
                .or_default()
                .insert(property_id, property);
        }
        StaticResolver { assets }
    }

    pub fn lookup(&self, key: &PropertyKey) -> Result<PropertyMetadata, Error> {
        let properties = self
            .assets
            .get(&key.asset_id)
            .ok_or_else(|| Error::AssetNotFound(key.asset_id.clone()))?;
        properties
            .get(&key.property_id)
            .cloned()
            .ok_or_else(|| Error::PropertyNotFound {
                asset_id: key.asset_id.clone(),
                property_id: key.property_id.clone(),
            })
    }
}

impl From<FramerConfig> for StaticResolver {
    fn from(config: FramerConfig) -> Self {
        StaticResolver::new(config.property)
    }
}

impl Resolver for StaticResolver {
    fn property(
        &self,
        key: &PropertyKey,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<PropertyMetadata, Error>> + Send {
        let result = if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            self.lookup(key)
        };
        std::future::ready(result)
    }
}
