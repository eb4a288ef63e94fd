//! Registration inputs and the persisted registration record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::crypto::KeyType;
use crate::did::Did;
use crate::timestamp;

// ---------------------------------------------------------------------------
// Personal Info
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersonalInfoError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("date of birth must be a past date in YYYY-MM-DD form")]
    InvalidDateOfBirth,

    #[error("phone number may contain digits, spaces, '-', '(' and ')' with an optional leading '+'")]
    InvalidPhoneNumber,
}

/// Write-once claim inputs collected at registration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl PersonalInfo {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            date_of_birth: None,
            phone_number: None,
        }
    }

    pub fn with_date_of_birth(mut self, dob: impl Into<String>) -> Self {
        self.date_of_birth = Some(dob.into());
        self
    }

    pub fn with_phone_number(mut self, phone: impl Into<String>) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    pub fn validate(&self) -> Result<(), PersonalInfoError> {
        if self.first_name.trim().is_empty() {
            return Err(PersonalInfoError::Empty("first name"));
        }
        if self.last_name.trim().is_empty() {
            return Err(PersonalInfoError::Empty("last name"));
        }
        if !is_valid_email(&self.email) {
            return Err(PersonalInfoError::InvalidEmail);
        }
        if let Some(dob) = &self.date_of_birth {
            if !is_valid_date_of_birth(dob) {
                return Err(PersonalInfoError::InvalidDateOfBirth);
            }
        }
        if let Some(phone) = &self.phone_number {
            if !is_valid_phone_number(phone) {
                return Err(PersonalInfoError::InvalidPhoneNumber);
            }
        }
        Ok(())
    }
}

// Personal data stays out of logs, including debug output.
impl fmt::Debug for PersonalInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonalInfo")
            .field("date_of_birth", &self.date_of_birth.is_some())
            .field("phone_number", &self.phone_number.is_some())
            .finish_non_exhaustive()
    }
}

/// `local@domain.tld`: no whitespace, something before the `@`, and a dot
/// with something on both sides after it.
fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    email.match_indices('@').any(|(at, _)| {
        let domain = &email[at + 1..];
        at > 0
            && domain
                .match_indices('.')
                .any(|(dot, _)| dot > 0 && dot + 1 < domain.len())
    })
}

fn is_valid_date_of_birth(dob: &str) -> bool {
    dob.len() == 10
        && NaiveDate::parse_from_str(dob, "%Y-%m-%d")
            .map(|d| d <= Utc::now().date_naive())
            .unwrap_or(false)
}

fn is_valid_phone_number(phone: &str) -> bool {
    let rest = phone.strip_prefix('+').unwrap_or(phone);
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '-' | '(' | ')'))
}

// ---------------------------------------------------------------------------
// Security Preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPreferences {
    /// Gate the signing step behind a user-presence check.
    pub biometric_enabled: bool,
    pub device_id: String,
    #[serde(with = "timestamp::serde_seconds")]
    pub registration_date: DateTime<Utc>,
}

impl SecurityPreferences {
    pub fn new(biometric_enabled: bool, device_id: impl Into<String>) -> Self {
        Self {
            biometric_enabled,
            device_id: device_id.into(),
            registration_date: timestamp::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Membership Tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    #[default]
    Basic,
    Verified,
    Premium,
}

impl MembershipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Basic => "basic",
            MembershipTier::Verified => "verified",
            MembershipTier::Premium => "premium",
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The device's single registration. Lives in the `registration` slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    pub key_id: String,
    pub did: Did,
    pub personal_info: PersonalInfo,
    pub security_preferences: SecurityPreferences,
    /// Id of the membership credential issued at registration.
    pub credential_id: String,
    pub wallet_id: String,
    pub verification_level: MembershipTier,
    #[serde(with = "timestamp::serde_seconds")]
    pub registered_at: DateTime<Utc>,
}

/// Marker for a registration in flight. Written before the key exists so
/// an interrupted attempt can be resumed with the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    pub key_id: String,
    pub key_type: KeyType,
    #[serde(with = "timestamp::serde_seconds")]
    pub started: DateTime<Utc>,
}

/// Where the orchestrator's state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered,
    /// The registration was deleted. Behaves as `Unregistered`.
    Deleted,
}

/// Answer to "is this wallet registered?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub registered: bool,
    pub state: RegistrationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> PersonalInfo {
        PersonalInfo::new("Ana", "Lee", "ana@example.com")
    }

    #[test]
    fn valid_info_passes() {
        assert!(ana().validate().is_ok());
        assert!(ana()
            .with_date_of_birth("1990-04-12")
            .with_phone_number("+1 (555) 010-2030")
            .validate()
            .is_ok());
    }

    #[test]
    fn empty_names_rejected() {
        let mut info = ana();
        info.first_name = "  ".into();
        assert_eq!(info.validate(), Err(PersonalInfoError::Empty("first name")));
        let mut info = ana();
        info.last_name.clear();
        assert_eq!(info.validate(), Err(PersonalInfoError::Empty("last name")));
    }

    #[test]
    fn email_shapes() {
        for good in ["ana@example.com", "a.b@c.d", "x@sub.domain.org"] {
            assert!(is_valid_email(good), "{good}");
        }
        for bad in ["", "ana", "ana@", "@example.com", "ana@example", "ana@.com", "ana@com.", "a na@x.y"] {
            assert!(!is_valid_email(bad), "{bad}");
        }
    }

    #[test]
    fn date_of_birth_shapes() {
        assert!(is_valid_date_of_birth("2000-02-29"));
        assert!(!is_valid_date_of_birth("2001-02-29"));
        assert!(!is_valid_date_of_birth("2000-2-9"));
        assert!(!is_valid_date_of_birth("12/04/1990"));
        assert!(!is_valid_date_of_birth("2999-01-01"));
    }

    #[test]
    fn phone_number_shapes() {
        assert!(is_valid_phone_number("+44 20 7946 0958"));
        assert!(is_valid_phone_number("(555) 010-2030"));
        assert!(!is_valid_phone_number("+"));
        assert!(!is_valid_phone_number("555-CALL-NOW"));
        assert!(!is_valid_phone_number("++1 555"));
    }

    #[test]
    fn debug_hides_personal_data() {
        let dbg = format!("{:?}", ana());
        assert!(!dbg.contains("Ana"));
        assert!(!dbg.contains("example.com"));
    }

    #[test]
    fn tier_serializes_lowercase() {
        assert_eq!(serde_json::to_value(MembershipTier::Premium).unwrap(), "premium");
        assert_eq!(MembershipTier::default(), MembershipTier::Basic);
    }

    #[test]
    fn record_json_roundtrip() {
        let record = RegistrationRecord {
            key_id: "k".into(),
            did: Did::new("key", "z6Mkabc"),
            personal_info: ana(),
            security_preferences: SecurityPreferences::new(true, "device-1"),
            credential_id: "urn:uuid:1".into(),
            wallet_id: "w".into(),
            verification_level: MembershipTier::Basic,
            registered_at: timestamp::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"firstName\":\"Ana\""));
        assert!(json.contains("\"biometricEnabled\":true"));
        let back: RegistrationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
