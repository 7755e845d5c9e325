use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;

/// What the gateway reported for a callback that could not be applied locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportedResult {
    Paid {
        receipt: Option<String>,
        amount: Option<Decimal>,
    },
    Failed {
        result_code: i64,
        result_desc: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UnreconciledReason {
    /// No payment row carries the checkout-request id: the callback beat the initiating
    /// write, that write failed, or the callback is a replay of an already settled one.
    NoMatchingPayment,
    /// The gateway reported success without an `MpesaReceiptNumber`.
    MissingReceipt,
    /// A row carries the checkout-request id but has already left `pending`.
    PaymentNotPending {
        payment_id: i32,
        status: PaymentStatus,
    },
    StoreFailure(String),
}

/// A callback that was acknowledged to the gateway without being reconciled. Carries
/// everything needed to replay it against the payment store later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreconciledCallback {
    pub id: Uuid,
    pub checkout_request_id: String,
    pub merchant_request_id: Option<String>,
    pub result: ReportedResult,
    pub reason: UnreconciledReason,
    pub received_at: DateTime<Utc>,
}

impl UnreconciledCallback {
    pub fn new(
        checkout_request_id: String,
        merchant_request_id: Option<String>,
        result: ReportedResult,
        reason: UnreconciledReason,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            checkout_request_id,
            merchant_request_id,
            result,
            reason,
            received_at,
        }
    }
}
