//! # Legionn Platform
//!
//! The main Core of the platform. Legionn manages other Cores the way a Core
//! manages Units, and the REST server exposes it to third parties.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::units::SharedCore;

pub const APP_NAME: &str = "Legionn";
pub const APP_VERSION: &str = "v16.01.00";
pub const DEFAULT_DESCRIPTION: &str = "Main Core of Legionn platform";

/// Server info group of the index endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// A registered Core as listed by the platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoreInfo {
    pub core_id: String,
    pub description: String,
}

/// A Unit of a registered Core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitInfo {
    pub unit_id: String,
}

/// Outcome of a platform-wide lifecycle call.
#[derive(Debug, Default)]
pub struct LifecycleReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

impl LifecycleReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry of Cores, keyed by name.
pub struct Legionn {
    name: String,
    description: String,
    cores: BTreeMap<String, SharedCore>,
}

impl Default for Legionn {
    fn default() -> Self {
        Self::new(APP_NAME, DEFAULT_DESCRIPTION)
    }
}

impl Legionn {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            cores: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: APP_NAME.to_string(),
            version: APP_VERSION.to_string(),
        }
    }

    /// Register `core` under `name`, or under the Core's own name when `None`.
    pub fn add(&mut self, core: SharedCore, name: Option<&str>) -> Result<()> {
        let name = match name {
            Some(name) => name.to_string(),
            None => core.name().to_string(),
        };
        if self.cores.contains_key(&name) {
            return Err(Error::DuplicateCore(name));
        }
        tracing::info!(core = %name, "Core registered");
        self.cores.insert(name, core);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<SharedCore> {
        let removed = self.cores.remove(name);
        if removed.is_some() {
            tracing::info!(core = %name, "Core removed");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cores.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<SharedCore> {
        self.cores.get(name).cloned()
    }

    /// Like `get`, but a miss is an error.
    pub fn core(&self, name: &str) -> Result<SharedCore> {
        self.get(name)
            .ok_or_else(|| Error::CoreNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    /// Registered Cores, sorted by id.
    pub fn cores(&self) -> Vec<CoreInfo> {
        self.cores
            .iter()
            .map(|(id, core)| CoreInfo {
                core_id: id.clone(),
                description: core.description().to_string(),
            })
            .collect()
    }

    /// Units of the Core `core_id`, sorted by id.
    pub fn units_of(&self, core_id: &str) -> Result<Vec<UnitInfo>> {
        let core = self.core(core_id)?;
        Ok(core
            .units()
            .ids()
            .into_iter()
            .map(|unit_id| UnitInfo { unit_id })
            .collect())
    }

    /// Activate every registered Core. One failure does not stop the rest.
    #[tracing::instrument(skip(self), fields(cores = self.cores.len()))]
    pub async fn activate_all(&self) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        for (name, core) in &self.cores {
            match core.activate().await {
                Ok(()) => report.succeeded.push(name.clone()),
                Err(e) => {
                    tracing::error!(core = %name, error = %e, "Activation failed");
                    report.failed.push((name.clone(), e));
                }
            }
        }
        report
    }

    /// Deactivate every registered Core. One failure does not stop the rest.
    #[tracing::instrument(skip(self), fields(cores = self.cores.len()))]
    pub async fn deactivate_all(&self) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        for (name, core) in &self.cores {
            match core.deactivate().await {
                Ok(()) => report.succeeded.push(name.clone()),
                Err(e) => {
                    tracing::warn!(core = %name, error = %e, "Deactivation failed");
                    report.failed.push((name.clone(), e));
                }
            }
        }
        report
    }
}
