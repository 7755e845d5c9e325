use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    entities::payments::PaymentEntity,
    value_objects::{
        correlation_token::CorrelationToken,
        enums::payment_statuses::PaymentStatus,
        mpesa::StkPushAcceptance,
        payment_errors::{PaymentError, PaymentResult},
    },
};

pub const STK_PUSH_INITIATED: &str = "STK Push initiated";

/// Body of `POST /payments/initiate`. Fields stay optional so that missing values are
/// reported as validation errors instead of deserialization failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InitiatePaymentModel {
    pub appointment_id: Option<i32>,
    pub user_id: Option<i32>,
    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitiatePaymentCommand {
    pub appointment_id: i32,
    pub user_id: Option<i32>,
    pub phone_number: String,
    pub amount: Decimal,
}

impl InitiatePaymentModel {
    pub fn validate(self) -> PaymentResult<InitiatePaymentCommand> {
        let appointment_id = self
            .appointment_id
            .ok_or_else(|| PaymentError::validation("appointment_id is required"))?;
        if appointment_id <= 0 {
            return Err(PaymentError::validation("appointment_id must be positive"));
        }

        let phone_number = self
            .phone_number
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty())
            .ok_or_else(|| PaymentError::validation("phoneNumber is required"))?;

        let amount = self
            .amount
            .ok_or_else(|| PaymentError::validation("amount is required"))?;
        if amount <= Decimal::ZERO {
            return Err(PaymentError::validation("amount must be greater than zero"));
        }

        Ok(InitiatePaymentCommand {
            appointment_id,
            user_id: self.user_id,
            phone_number,
            amount,
        })
    }
}

/// Amount as stored in `numeric(10,2)`.
pub fn to_stored_amount(amount: Decimal) -> Decimal {
    let mut stored = amount.round_dp(2);
    stored.rescale(2);
    stored
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InitiatedPaymentDto {
    pub message: String,
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: String,
}

impl From<StkPushAcceptance> for InitiatedPaymentDto {
    fn from(value: StkPushAcceptance) -> Self {
        Self {
            message: STK_PUSH_INITIATED.to_string(),
            merchant_request_id: value.merchant_request_id,
            checkout_request_id: value.checkout_request_id,
            customer_message: value.customer_message,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentModel {
    pub payment_id: i32,
    pub appointment_id: i32,
    pub user_id: Option<i32>,
    pub amount: Decimal,
    pub payment_status: PaymentStatus,
    pub correlation: Option<CorrelationToken>,
    pub payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentEntity> for PaymentModel {
    type Error = PaymentError;

    fn try_from(value: PaymentEntity) -> Result<Self, Self::Error> {
        let payment_status = PaymentStatus::from_str(&value.payment_status).ok_or_else(|| {
            PaymentError::Persistence(anyhow::anyhow!(
                "payment {} has unknown status {}",
                value.payment_id,
                value.payment_status
            ))
        })?;

        Ok(Self {
            payment_id: value.payment_id,
            appointment_id: value.appointment_id,
            user_id: value.user_id,
            amount: value.amount,
            payment_status,
            correlation: CorrelationToken::from_stored(
                value.transaction_id.as_deref(),
                value.payment_date,
            ),
            payment_date: value.payment_date,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}
