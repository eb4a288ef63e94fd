//! The membership credential issued at registration.

use chrono::{DateTime, Utc};

use super::record::{MembershipTier, PersonalInfo, SecurityPreferences};
use crate::config::{MEMBERSHIP_CREDENTIAL_TYPE, WALLET_CREDENTIALS_CONTEXT};
use crate::credential::ClaimSet;
use crate::did::Did;
use crate::timestamp;

/// Everything that goes into a membership credential besides the holder's
/// personal info.
#[derive(Debug, Clone)]
pub struct MembershipTerms<'a> {
    pub holder: &'a Did,
    pub issuer: &'a str,
    pub wallet_id: &'a str,
    pub tier: MembershipTier,
    pub issued: DateTime<Utc>,
}

/// Build the claim set of a membership credential. Expiration is left to
/// the issuer's validity window.
pub fn membership_claims(
    terms: &MembershipTerms<'_>,
    info: &PersonalInfo,
    prefs: &SecurityPreferences,
) -> ClaimSet {
    let mut claims = ClaimSet::new()
        .with_context(WALLET_CREDENTIALS_CONTEXT)
        .with_type(MEMBERSHIP_CREDENTIAL_TYPE)
        .with_issuer(terms.issuer)
        .with_subject(terms.holder)
        .with_claim("firstName", info.first_name.as_str())
        .with_claim("lastName", info.last_name.as_str())
        .with_claim("email", info.email.as_str())
        .with_claim("walletId", terms.wallet_id)
        .with_claim(
            "registrationDate",
            timestamp::format(&prefs.registration_date),
        )
        .with_claim("verificationLevel", terms.tier.as_str())
        .issued_at(terms.issued);

    if let Some(dob) = &info.date_of_birth {
        claims = claims.with_claim("dateOfBirth", dob.as_str());
    }
    if let Some(phone) = &info.phone_number {
        claims = claims.with_claim("phoneNumber", phone.as_str());
    }
    claims
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BASE_CREDENTIAL_TYPE, W3C_CREDENTIALS_CONTEXT};

    #[test]
    fn membership_claim_shape() {
        let holder = Did::new("key", "z6Mkholder");
        let info = PersonalInfo::new("Ana", "Lee", "ana@example.com");
        let prefs = SecurityPreferences::new(false, "device-1");
        let terms = MembershipTerms {
            holder: &holder,
            issuer: "did:key:sevis-wallet-issuer",
            wallet_id: "wallet-1",
            tier: MembershipTier::Basic,
            issued: timestamp::now(),
        };
        let claims = membership_claims(&terms, &info, &prefs);

        assert_eq!(claims.context, vec![W3C_CREDENTIALS_CONTEXT, WALLET_CREDENTIALS_CONTEXT]);
        assert_eq!(claims.types, vec![BASE_CREDENTIAL_TYPE, MEMBERSHIP_CREDENTIAL_TYPE]);
        assert_eq!(claims.subject_id(), Some("did:key:z6Mkholder"));
        assert_eq!(claims.claim("firstName").unwrap(), "Ana");
        assert_eq!(claims.claim("verificationLevel").unwrap(), "basic");
        assert_eq!(claims.claim("walletId").unwrap(), "wallet-1");
        assert!(claims.claim("dateOfBirth").is_none());
        assert!(claims.expiration_date.is_none());
    }

    #[test]
    fn optional_fields_included_when_present() {
        let holder = Did::new("key", "z6Mkholder");
        let info = PersonalInfo::new("Ana", "Lee", "ana@example.com")
            .with_date_of_birth("1990-04-12")
            .with_phone_number("+1 555 0100");
        let prefs = SecurityPreferences::new(true, "device-1");
        let terms = MembershipTerms {
            holder: &holder,
            issuer: "did:key:z6Mkholder",
            wallet_id: "w",
            tier: MembershipTier::Verified,
            issued: timestamp::now(),
        };
        let claims = membership_claims(&terms, &info, &prefs);
        assert_eq!(claims.claim("dateOfBirth").unwrap(), "1990-04-12");
        assert_eq!(claims.claim("phoneNumber").unwrap(), "+1 555 0100");
        assert_eq!(claims.claim("verificationLevel").unwrap(), "verified");
    }
}
