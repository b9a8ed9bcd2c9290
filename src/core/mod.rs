pub mod engine;
pub mod gateway;
pub mod noise_filter;
pub mod orchestrator;
pub mod reconciler;
pub mod throttle;

pub use crate::domain::model::{CandidateListing, FetchOutcome, Identifier, ReconciledRecord};
pub use crate::domain::ports::{NameResolver, SheetClient, SourceAdapter};
pub use crate::utils::error::Result;
