pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;

pub use adapters::{browser::ChromiumBrowser, build_orchestrator, sheet::CsvSheet};
pub use config::AppConfig;
pub use core::engine::{BatchItem, BatchSummary, PriceEngine, WriteMode};
pub use core::gateway::PersistenceGateway;
pub use core::orchestrator::SourceOrchestrator;
pub use domain::model::Identifier;
pub use utils::error::{Result, ScoutError};
