pub mod evaluator;
pub mod gate;
pub mod orchestrator;
pub mod service;

pub use gate::ConcurrencyGate;
pub use orchestrator::ScanOrchestrator;
pub use service::ScanService;
