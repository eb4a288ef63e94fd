//! The user-presence gate.
//!
//! Biometric prompts belong to the platform layer. The orchestrator only
//! needs a yes or no before it lets the key store sign, and it asks only
//! when the user opted into biometric protection.

use async_trait::async_trait;

#[async_trait]
pub trait UserPresence: Send + Sync {
    /// Ask the user to confirm presence. `reason` is shown in the prompt.
    async fn confirm(&self, reason: &str) -> bool;
}

/// Presence is always confirmed. For headless use and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPresent;

#[async_trait]
impl UserPresence for AlwaysPresent {
    async fn confirm(&self, _reason: &str) -> bool {
        true
    }
}
