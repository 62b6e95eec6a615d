//! YoID Pipeline: Drains the tenant and credential ledgers in time-boxed
//! batch runs, and reads issued credentials back for display.

pub mod directory;
pub mod error;
pub mod report;
pub mod scheduler;
pub mod wallet;

pub use directory::{DomainDirectory, MemoryDirectory};
pub use error::PipelineError;
pub use report::{ItemOutcome, JobKind, OutcomeKind, RunReport};
pub use scheduler::Scheduler;
pub use wallet::{CredentialFilter, WalletReader};
