//! # Legionn Core
//!
//! Plugin-hosting platform: a registry of Cores, each master of its Units,
//! plus the bots shipped with the platform.
//!
//! ## Architecture
//!
//! - `units` - `Core` and `Unit` contracts, `UnitRegistry`
//! - `platform` - `Legionn`, the registry of Cores served over REST
//! - `bots` - `CleverJabberBot` and the Cleverbot client
//! - `config` - `LegionnConfig` loading
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use legionn_core::bots::{Cleverbot, CleverJabberBot};
//! use legionn_core::{Legionn, LegionnConfig};
//!
//! let config = LegionnConfig::load(&LegionnConfig::resolve_path(None))?;
//! let brain = Arc::new(Cleverbot::new(&config.cleverbot)?);
//! let bot = CleverJabberBot::new(config.jabber.unwrap(), brain)?;
//!
//! let mut legionn = Legionn::default();
//! legionn.add(Arc::new(bot), None)?;
//! legionn.activate_all().await;
//! ```

pub mod bots;
pub mod config;
pub mod error;
pub mod platform;
pub mod units;

pub use config::LegionnConfig;
pub use error::{Error, Result};
pub use platform::{CoreInfo, Legionn, ServerInfo, UnitInfo, APP_NAME, APP_VERSION};
pub use units::{Core, SharedCore, SharedUnit, Unit, UnitRegistry};
