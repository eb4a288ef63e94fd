//! # Storage Module
//!
//! Everything the wallet remembers between launches goes through a
//! [`SecureStore`]: key pairs, identifier records, credentials and the
//! registration record. Components never touch sled directly.
//!
//! ## Architecture
//!
//! ```text
//! store.rs      — SecureStore trait, WriteBatch, typed helpers
//! db.rs         — sled-backed store (one tree, atomic batches)
//! encrypted.rs  — AES-256-GCM wrapper sealing every value at rest
//! ```
//!
//! ## Key Layout
//!
//! | Slot                       | Value                         |
//! |----------------------------|-------------------------------|
//! | `key:<alias>`              | `bincode(StoredKey)`          |
//! | `did:<did>`                | `bincode(IdentifierRecord)`   |
//! | `did-deactivated:<did>`    | deactivation timestamp        |
//! | `credential:<id>`          | `json(SignedCredential)`      |
//! | `registration`             | `json(RegistrationRecord)`    |
//! | `registration-pending`     | `json(PendingRegistration)`   |
//!
//! Credentials and the registration record are JSON because they are
//! exported as-is; the fixed-shape records are bincode.

pub mod db;
pub mod encrypted;
pub mod store;

pub use db::SledStore;
pub use encrypted::EncryptedStore;
pub use store::{BatchOp, SecureStore, StoreError, StoreExt, StoreResult, WriteBatch};
