//! Check-execution worker: stored-record validation, probing, outcome
//! processing and the periodic sweeps that drive them.

pub mod outcome;
pub mod prober;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use outcome::OutcomeProcessor;
pub use prober::Prober;
pub use scheduler::Worker;
pub use types::{CheckState, LogEntry, Outcome};
