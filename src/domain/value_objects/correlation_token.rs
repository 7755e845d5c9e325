use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The value held in `payments.transaction_id`.
///
/// While a payment waits for its callback the column carries the gateway's
/// checkout-request id. A successful callback overwrites it with the M-Pesa
/// receipt, after which the row can no longer be found by the original id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrelationToken {
    Pending { checkout_request_id: String },
    Settled { receipt: String },
}

impl CorrelationToken {
    pub fn pending(checkout_request_id: impl Into<String>) -> Self {
        CorrelationToken::Pending {
            checkout_request_id: checkout_request_id.into(),
        }
    }

    pub fn settled(receipt: impl Into<String>) -> Self {
        CorrelationToken::Settled {
            receipt: receipt.into(),
        }
    }

    /// Rebuilds the token from a stored row. `payment_date` is only ever written by
    /// successful reconciliation, so its presence marks the column as a receipt.
    pub fn from_stored(
        transaction_id: Option<&str>,
        payment_date: Option<NaiveDate>,
    ) -> Option<Self> {
        let value = transaction_id?;
        Some(match payment_date {
            Some(_) => CorrelationToken::settled(value),
            None => CorrelationToken::pending(value),
        })
    }

    /// Text written to the `transaction_id` column.
    pub fn column_value(&self) -> &str {
        match self {
            CorrelationToken::Pending {
                checkout_request_id,
            } => checkout_request_id,
            CorrelationToken::Settled { receipt } => receipt,
        }
    }

    /// Consumes the checkout-request id. Settling an already settled token keeps the
    /// newer receipt.
    pub fn settle(self, receipt: impl Into<String>) -> Self {
        CorrelationToken::settled(receipt)
    }

    /// The checkout-request id a callback may still match on. Settled tokens have none.
    pub fn pending_checkout_request(&self) -> Option<&str> {
        match self {
            CorrelationToken::Pending {
                checkout_request_id,
            } => Some(checkout_request_id),
            CorrelationToken::Settled { .. } => None,
        }
    }

    /// Whether a callback carrying `checkout_request_id` can reconcile this token.
    pub fn is_matched_by(&self, checkout_request_id: &str) -> bool {
        match self {
            CorrelationToken::Pending {
                checkout_request_id: stored,
            } => stored == checkout_request_id,
            CorrelationToken::Settled { .. } => false,
        }
    }
}
