pub mod dispatcher;
pub mod orchestrator;
pub mod registry;
pub mod types;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use orchestrator::{RegionOrchestrator, WorkerSettings};
pub use registry::{RegionEntry, RegionRegistry};
pub use types::{BatchOutcome, CycleReport, DispatchStatus, WorkerMessage, WorkerState};
pub use worker::RegionWorker;
