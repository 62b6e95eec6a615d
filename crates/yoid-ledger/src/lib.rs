//! YoID Ledger: Persistent state machines tracking tenant-provisioning and
//! credential-issuance requests.
//!
//! Records are created once per key by the `schedule_*` operations and are
//! mutated only through the outcome updates applied by the scheduler.

pub mod credential;
pub mod error;
mod outcome;
pub mod record;
pub mod store;
pub mod tenant;

pub use credential::CredentialLedger;
pub use error::LedgerError;
pub use record::{
    CredentialIssuanceRecord, CredentialKey, IssuanceLink, LedgerRecord, TenantEntity,
    TenantProvisioningRecord,
};
pub use store::{MemoryStore, RecordStore};
pub use tenant::TenantLedger;
