use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::payments::{
        FailPaymentEntity, InsertPaymentEntity, PaymentEntity, SettlePaymentEntity,
    },
    value_objects::{
        correlation_token::CorrelationToken, enums::appointment_statuses::AppointmentStatus,
    },
};

/// Persistence boundary for payments and the appointment status they drive.
///
/// The `*_pending` updates only touch rows still in `pending` whose `transaction_id`
/// equals the token's checkout-request id; a settled token matches nothing. Nothing here
/// enforces uniqueness of pending checkout-request ids, and the payment update and the
/// appointment update are separate statements.
#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn insert_pending(&self, payment: InsertPaymentEntity) -> Result<i32>;

    /// Returns the updated row, or `None` when no row matched.
    async fn settle_pending(
        &self,
        token: CorrelationToken,
        changeset: SettlePaymentEntity,
    ) -> Result<Option<PaymentEntity>>;

    /// Returns the ids of the rows marked failed.
    async fn fail_pending(
        &self,
        token: CorrelationToken,
        changeset: FailPaymentEntity,
    ) -> Result<Vec<i32>>;

    async fn update_appointment_status(
        &self,
        appointment_id: i32,
        status: AppointmentStatus,
    ) -> Result<()>;

    /// Every row whose `transaction_id` equals `transaction_id`, whatever its status.
    async fn find_by_transaction_id(&self, transaction_id: String) -> Result<Vec<PaymentEntity>>;

    async fn find_by_id(&self, payment_id: i32) -> Result<Option<PaymentEntity>>;

    async fn list_by_appointment(&self, appointment_id: i32) -> Result<Vec<PaymentEntity>>;

    async fn list_all(&self) -> Result<Vec<PaymentEntity>>;
}
