use std::sync::Arc;

use tracing::error;

use crate::domain::{
    repositories::payments::PaymentRepository,
    value_objects::{
        payment_errors::{PaymentError, PaymentResult},
        payments::PaymentModel,
    },
};

pub struct PaymentQueryUseCase<R>
where
    R: PaymentRepository + Send + Sync + 'static,
{
    payment_repo: Arc<R>,
}

impl<R> PaymentQueryUseCase<R>
where
    R: PaymentRepository + Send + Sync + 'static,
{
    pub fn new(payment_repo: Arc<R>) -> Self {
        Self { payment_repo }
    }

    pub async fn find_payment(&self, payment_id: i32) -> PaymentResult<PaymentModel> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await
            .map_err(|err| {
                error!(payment_id, db_error = ?err, "payments: failed to load payment");
                PaymentError::Persistence(err)
            })?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {payment_id}")))?;

        PaymentModel::try_from(payment)
    }

    /// Every payment, newest first.
    pub async fn list_payments(&self) -> PaymentResult<Vec<PaymentModel>> {
        let payments = self.payment_repo.list_all().await.map_err(|err| {
            error!(db_error = ?err, "payments: failed to list payments");
            PaymentError::Persistence(err)
        })?;

        payments.into_iter().map(PaymentModel::try_from).collect()
    }

    /// Newest first.
    pub async fn list_for_appointment(
        &self,
        appointment_id: i32,
    ) -> PaymentResult<Vec<PaymentModel>> {
        let payments = self
            .payment_repo
            .list_by_appointment(appointment_id)
            .await
            .map_err(|err| {
                error!(
                    appointment_id,
                    db_error = ?err,
                    "payments: failed to list payments for appointment"
                );
                PaymentError::Persistence(err)
            })?;

        payments.into_iter().map(PaymentModel::try_from).collect()
    }
}
