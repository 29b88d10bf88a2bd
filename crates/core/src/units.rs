//! # Cores and Units
//!
//! The two contracts every Legionn plugin is built from.
//!
//! A `Core` is master of its Units: it holds their common knowledge, produces
//! them and takes them down. A `Unit` is an addressable request handler that
//! answers `get`, `post` and `put` with an optional text message.
//!
//! ```text
//! Legionn
//!   └── Core (activate / deactivate / create_unit)
//!         └── Unit (get / post / put)
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};

/// A Unit shared between its Core and in-flight requests.
pub type SharedUnit = Arc<dyn Unit>;

/// A Core shared between the platform and in-flight requests.
pub type SharedCore = Arc<dyn Core>;

/// Basic interface of a Unit handling requests.
///
/// Every verb defaults to `Error::Unsupported`, so a Unit only implements the
/// verbs it actually answers.
#[async_trait]
pub trait Unit: Send + Sync {
    /// Short type name, used in descriptions and logs.
    fn kind(&self) -> &'static str {
        "unit"
    }

    async fn get(&self, _msg: Option<&str>) -> Result<String> {
        Err(Error::unsupported(format!("{}.get", self.kind())))
    }

    async fn post(&self, _msg: Option<&str>) -> Result<String> {
        Err(Error::unsupported(format!("{}.post", self.kind())))
    }

    async fn put(&self, _msg: Option<&str>) -> Result<String> {
        Err(Error::unsupported(format!("{}.put", self.kind())))
    }

    /// JSON description of the Unit state.
    fn describe(&self) -> serde_json::Value {
        json!({ "kind": self.kind() })
    }
}

/// Named Units of one Core.
///
/// The map lock is only held for lookups and inserts, never across an await.
#[derive(Default)]
pub struct UnitRegistry {
    owner: String,
    units: RwLock<BTreeMap<String, SharedUnit>>,
}

impl UnitRegistry {
    /// Create an empty registry owned by the Core `owner`.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            units: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert `unit` under the unique name `name`.
    pub fn add(&self, unit: SharedUnit, name: &str) -> Result<()> {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        if units.contains_key(name) {
            return Err(Error::DuplicateUnit {
                core: self.owner.clone(),
                unit: name.to_string(),
            });
        }
        units.insert(name.to_string(), unit);
        Ok(())
    }

    /// Insert `unit` under the first free `unit-<n>` name and return that name.
    pub fn add_generated(&self, unit: SharedUnit) -> String {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        let mut n = 1;
        let mut name = format!("unit-{n}");
        while units.contains_key(&name) {
            n += 1;
            name = format!("unit-{n}");
        }
        units.insert(name.clone(), unit);
        name
    }

    /// Get the Unit called `name`, creating it with `make` on first use.
    pub fn get_or_insert_with(&self, name: &str, make: impl FnOnce() -> SharedUnit) -> SharedUnit {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        units.entry(name.to_string()).or_insert_with(make).clone()
    }

    pub fn remove(&self, name: &str) -> Option<SharedUnit> {
        self.units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn get(&self, name: &str) -> Option<SharedUnit> {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// True if this exact Unit instance is registered under any name.
    pub fn contains_unit(&self, unit: &SharedUnit) -> bool {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|u| Arc::ptr_eq(u, unit))
    }

    /// Unit names in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface of a Core.
///
/// The platform calls `activate` when the Core is registered and started,
/// and `deactivate` when it shuts down.
#[async_trait]
pub trait Core: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn units(&self) -> &UnitRegistry;

    /// Bring the Core up. `Ok(())` means it is serving.
    async fn activate(&self) -> Result<()>;

    /// Take the Core down and release its connections.
    async fn deactivate(&self) -> Result<()>;

    fn is_active(&self) -> bool;

    /// Produce a new Unit for communication.
    fn create_unit(&self) -> Result<SharedUnit> {
        Err(Error::unsupported(format!("{}.create_unit", self.name())))
    }

    fn add_unit(&self, unit: SharedUnit, name: &str) -> Result<()> {
        self.units().add(unit, name)
    }

    fn remove_unit(&self, name: &str) -> Option<SharedUnit> {
        self.units().remove(name)
    }

    fn contains_unit(&self, name: &str) -> bool {
        self.units().contains(name)
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "active": self.is_active(),
            "units": self.units().ids(),
        })
    }
}
