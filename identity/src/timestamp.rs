//! Wall-clock timestamps as they appear in credentials.
//!
//! Every timestamp we sign is a fixed `YYYY-MM-DDTHH:MM:SSZ` string,
//! truncated to whole seconds. Sub-second precision would make the
//! serialized form depend on the clock's resolution, and the bytes we sign
//! must be the bytes we later verify.

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};

/// The one format we write.
pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Now, truncated to the second.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

/// Parse a timestamp in exactly [`FORMAT`].
///
/// Offsets and fractional seconds are rejected rather than normalized: a
/// credential whose timestamps we would re-serialize differently could
/// never verify anyway.
pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, FORMAT).map(|naive| Utc.from_utc_datetime(&naive))
}

/// `#[serde(with = "timestamp::serde_seconds")]`
pub mod serde_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Optional variant of [`serde_seconds`]. Pair with
/// `#[serde(default, skip_serializing_if = "Option::is_none")]`.
pub mod serde_seconds_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_some(&super::format(ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => super::parse(&raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
