pub mod bootstrap;
pub mod capability;
pub mod committer;
pub mod governor;
pub mod orchestrator;
pub mod segmenter;
pub mod shutdown;
pub mod source;
pub mod store;
pub mod telemetry;
pub mod transform;

#[cfg(test)]
pub(crate) mod testing;

pub use capability::{Capability, ExtractionCapability, ItemOutcome, TranslationCapability};
pub use governor::{LoadGovernor, LoadSampler, SysinfoSampler};
pub use orchestrator::{RunStats, Worker, WorkerState};
pub use store::{ArticleStore, PgStore, StoreHealth};
