//! # Registration
//!
//! First-run onboarding. One call takes the device from nothing to a
//! signed membership credential:
//!
//! ```text
//!   Unregistered ──register──▶ Registering ──commit──▶ Registered
//!        ▲                         │                      │
//!        └──────── rollback ◀──────┘                      │
//!        └───────────────── Deleted ◀──delete_registration┘
//! ```
//!
//! A pending marker is written before the key exists. If the process dies
//! mid-flight, the next `register` finds the marker, reuses the key it
//! names, and finishes the job instead of minting a second identity.

pub mod membership;
pub mod orchestrator;
pub mod presence;
pub mod record;

use thiserror::Error;

use crate::credential::IssueError;
use crate::did::DidError;
use crate::keystore::KeyStoreError;
use crate::storage::StoreError;

pub use membership::{membership_claims, MembershipTerms};
pub use orchestrator::{RegistrationOrchestrator, WalletIdentity};
pub use presence::{AlwaysPresent, UserPresence};
pub use record::{
    MembershipTier, PendingRegistration, PersonalInfo, PersonalInfoError, RegistrationRecord,
    RegistrationState, RegistrationStatus, SecurityPreferences,
};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid personal info: {0}")]
    InvalidPersonalInfo(#[from] PersonalInfoError),

    #[error("a registration operation is already in progress")]
    RegistrationInProgress,

    /// The attempt failed and so did the cleanup. Calling `register`
    /// again resumes from the pending marker.
    #[error("registration failed ({cause}) and rollback did not complete ({rollback})")]
    PartialRegistration { cause: String, rollback: String },

    #[error("user presence was not confirmed")]
    PresenceDenied,

    #[error("wallet is not registered")]
    NotRegistered,

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    Identifier(#[from] DidError),

    #[error(transparent)]
    Issue(#[from] IssueError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("background task failed: {0}")]
    TaskFailed(String),
}

pub type RegistrationResult<T> = Result<T, RegistrationError>;
