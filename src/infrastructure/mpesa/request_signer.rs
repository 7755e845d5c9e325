use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, FixedOffset, Utc};

use crate::domain::value_objects::mpesa::SignedRequest;

/// Derives the `Timestamp` and `Password` fields of an STK push request.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    shortcode: String,
    passkey: String,
    offset: FixedOffset,
}

impl RequestSigner {
    pub fn new(shortcode: String, passkey: String, offset: FixedOffset) -> Self {
        Self {
            shortcode,
            passkey,
            offset,
        }
    }

    /// `YYYYMMDDHHmmss` in the gateway's local time.
    pub fn timestamp(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.offset)
            .format("%Y%m%d%H%M%S")
            .to_string()
    }

    pub fn password(&self, timestamp: &str) -> String {
        STANDARD.encode(format!("{}{}{}", self.shortcode, self.passkey, timestamp))
    }

    /// Both values come from the same instant; the gateway re-derives the password from
    /// the timestamp it receives.
    pub fn sign(&self, now: DateTime<Utc>) -> SignedRequest {
        let timestamp = self.timestamp(now);
        let password = self.password(&timestamp);
        SignedRequest {
            timestamp,
            password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer() -> RequestSigner {
        RequestSigner::new(
            "174379".to_string(),
            "passkey".to_string(),
            FixedOffset::east_opt(3 * 3600).unwrap(),
        )
    }

    #[test]
    fn timestamp_is_fourteen_digits_in_gateway_local_time() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 22, 5, 9).unwrap();

        let timestamp = signer().timestamp(now);

        assert_eq!(timestamp, "20250315010509");
        assert_eq!(timestamp.len(), 14);
    }

    #[test]
    fn password_is_base64_of_shortcode_passkey_and_timestamp() {
        let password = signer().password("20250315010509");

        let decoded = String::from_utf8(STANDARD.decode(password).unwrap()).unwrap();
        assert_eq!(decoded, "174379passkey20250315010509");
    }

    #[test]
    fn sign_is_deterministic_for_a_fixed_clock() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();

        let first = signer().sign(now);
        let second = signer().sign(now);

        assert_eq!(first, second);
        assert_eq!(first.timestamp, "20250102060405");
        assert_eq!(first.password, signer().password(&first.timestamp));
    }
}
