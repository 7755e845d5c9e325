use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::value_objects::payment_errors::{PaymentError, PaymentResult};

pub const TRANSACTION_TYPE_PAYBILL: &str = "CustomerPayBillOnline";
pub const TRANSACTION_DESC_APPOINTMENT: &str = "Appointment Payment";
pub const RECEIPT_ITEM: &str = "MpesaReceiptNumber";
pub const AMOUNT_ITEM: &str = "Amount";

/// Bearer token issued by the OAuth endpoint. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Timestamp and password pair derived from a single clock reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub timestamp: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: serde_json::Number,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

pub struct StkPushParams<'a> {
    pub shortcode: &'a str,
    pub signed: SignedRequest,
    pub amount: Decimal,
    pub phone_number: &'a str,
    pub callback_base_url: &'a str,
    pub appointment_id: i32,
}

impl StkPushRequest {
    pub fn new(params: StkPushParams<'_>) -> Self {
        let callback_base_url = params.callback_base_url.trim_end_matches('/');

        Self {
            business_short_code: params.shortcode.to_string(),
            password: params.signed.password,
            timestamp: params.signed.timestamp,
            transaction_type: TRANSACTION_TYPE_PAYBILL.to_string(),
            amount: amount_to_json(params.amount),
            party_a: params.phone_number.to_string(),
            party_b: params.shortcode.to_string(),
            phone_number: params.phone_number.to_string(),
            // The query parameter is for log correlation only; callbacks are matched by
            // CheckoutRequestID.
            call_back_url: format!(
                "{}/payments/payment-callback?paymentid={}",
                callback_base_url, params.appointment_id
            ),
            account_reference: format!("APPT-{}", params.appointment_id),
            transaction_desc: TRANSACTION_DESC_APPOINTMENT.to_string(),
        }
    }
}

/// Whole amounts go out as JSON integers, fractional ones as floats.
fn amount_to_json(amount: Decimal) -> serde_json::Number {
    let normalized = amount.normalize();
    if normalized.fract().is_zero() {
        if let Some(whole) = normalized.to_i64() {
            return serde_json::Number::from(whole);
        }
    }

    normalized
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .unwrap_or_else(|| serde_json::Number::from(0))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StkPushAcceptance {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: String,
}

impl StkPushAcceptance {
    pub fn parse(raw: &str) -> PaymentResult<Self> {
        serde_json::from_str(raw).map_err(|err| {
            PaymentError::GatewayProtocol(format!(
                "failed to parse STK push response: {err} | Body: {raw}"
            ))
        })
    }
}

// Callback webhook payload

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode", deserialize_with = "deserialize_result_code")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

impl StkCallbackEnvelope {
    /// Parses a raw webhook body down to the `stkCallback` node.
    pub fn parse(raw: &[u8]) -> PaymentResult<StkCallback> {
        serde_json::from_slice::<StkCallbackEnvelope>(raw)
            .map(|envelope| envelope.body.stk_callback)
            .map_err(|err| PaymentError::CallbackValidation(err.to_string()))
    }
}

impl StkCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    /// Looks an item up by name; the gateway does not guarantee item order.
    pub fn metadata_value(&self, name: &str) -> Option<&serde_json::Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    }

    pub fn receipt(&self) -> Option<String> {
        match self.metadata_value(RECEIPT_ITEM)? {
            serde_json::Value::String(receipt) if !receipt.trim().is_empty() => {
                Some(receipt.trim().to_string())
            }
            serde_json::Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    pub fn reported_amount(&self) -> Option<Decimal> {
        match self.metadata_value(AMOUNT_ITEM)? {
            serde_json::Value::Number(number) => Decimal::from_str(&number.to_string())
                .or_else(|_| Decimal::from_scientific(&number.to_string()))
                .ok(),
            serde_json::Value::String(raw) => Decimal::from_str(raw.trim()).ok(),
            _ => None,
        }
    }
}

fn deserialize_result_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawResultCode {
        Number(i64),
        Text(String),
    }

    match RawResultCode::deserialize(deserializer)? {
        RawResultCode::Number(code) => Ok(code),
        RawResultCode::Text(code) => code
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid ResultCode: {code}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn signed() -> SignedRequest {
        SignedRequest {
            timestamp: "20250314093000".to_string(),
            password: "c2VjcmV0".to_string(),
        }
    }

    #[test]
    fn stk_push_request_uses_gateway_field_names() {
        let request = StkPushRequest::new(StkPushParams {
            shortcode: "174379",
            signed: signed(),
            amount: dec!(1200),
            phone_number: "0712345678",
            callback_base_url: "https://clinic.example.com/",
            appointment_id: 1,
        });

        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            json!({
                "BusinessShortCode": "174379",
                "Password": "c2VjcmV0",
                "Timestamp": "20250314093000",
                "TransactionType": "CustomerPayBillOnline",
                "Amount": 1200,
                "PartyA": "0712345678",
                "PartyB": "174379",
                "PhoneNumber": "0712345678",
                "CallBackURL": "https://clinic.example.com/payments/payment-callback?paymentid=1",
                "AccountReference": "APPT-1",
                "TransactionDesc": "Appointment Payment",
            })
        );
    }

    #[test]
    fn whole_amounts_with_trailing_zero_scale_are_sent_as_integers() {
        assert_eq!(amount_to_json(dec!(1200.00)), serde_json::Number::from(1200));
        assert_eq!(amount_to_json(dec!(99.5)).as_f64(), Some(99.5));
    }

    #[test]
    fn acceptance_parse_error_carries_the_raw_body() {
        let err = StkPushAcceptance::parse("<html>Bad Gateway</html>").unwrap_err();

        match err {
            PaymentError::GatewayProtocol(message) => {
                assert!(message.contains("<html>Bad Gateway</html>"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn callback_metadata_is_looked_up_by_name_not_position() {
        let raw = json!({
            "Body": { "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_123",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": { "Item": [
                    { "Name": "Balance" },
                    { "Name": "Amount", "Value": 1200 },
                    { "Name": "TransactionDate", "Value": 20250314093012u64 },
                    { "Name": "MpesaReceiptNumber", "Value": "QAX123" },
                    { "Name": "PhoneNumber", "Value": 254712345678u64 }
                ]}
            }}
        });

        let callback = StkCallbackEnvelope::parse(raw.to_string().as_bytes()).unwrap();

        assert!(callback.is_success());
        assert_eq!(callback.checkout_request_id, "ws_CO_123");
        assert_eq!(callback.receipt().as_deref(), Some("QAX123"));
        assert_eq!(callback.reported_amount(), Some(dec!(1200)));
    }

    #[test]
    fn failure_callback_without_metadata_parses() {
        let raw = json!({
            "Body": { "stkCallback": {
                "CheckoutRequestID": "ws_CO_123",
                "ResultCode": "1032",
                "ResultDesc": "Request cancelled by user"
            }}
        });

        let callback = StkCallbackEnvelope::parse(raw.to_string().as_bytes()).unwrap();

        assert!(!callback.is_success());
        assert_eq!(callback.result_code, 1032);
        assert_eq!(callback.receipt(), None);
        assert_eq!(callback.reported_amount(), None);
    }

    #[test]
    fn missing_stk_callback_node_is_a_validation_error() {
        let raw = json!({ "Body": { "somethingElse": {} } });

        let err = StkCallbackEnvelope::parse(raw.to_string().as_bytes()).unwrap_err();

        assert!(matches!(err, PaymentError::CallbackValidation(_)));
    }

    #[test]
    fn non_json_callback_is_a_validation_error() {
        let err = StkCallbackEnvelope::parse(b"not json").unwrap_err();

        assert!(matches!(err, PaymentError::CallbackValidation(_)));
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken::new("abc123");

        assert_eq!(format!("{token:?}"), "AccessToken(***)");
        assert_eq!(token.as_str(), "abc123");
    }
}
