use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    application::usercases::payment_initiation::Clock,
    domain::{
        entities::payments::{FailPaymentEntity, SettlePaymentEntity},
        repositories::{
            payments::PaymentRepository, unreconciled_callbacks::UnreconciledCallbackSink,
        },
        value_objects::{
            correlation_token::CorrelationToken,
            enums::{appointment_statuses::AppointmentStatus, payment_statuses::PaymentStatus},
            mpesa::{StkCallback, StkCallbackEnvelope},
            payment_errors::PaymentResult,
            unreconciled_callbacks::{ReportedResult, UnreconciledCallback, UnreconciledReason},
        },
    },
};

/// Result of reconciling one webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Paid {
        payment_id: i32,
        receipt: String,
        appointment_confirmed: bool,
    },
    Failed {
        checkout_request_id: String,
        payment_ids: Vec<i32>,
    },
    /// Acknowledged to the gateway without touching any row.
    Unreconciled(UnreconciledCallback),
}

/// Response body returned to the gateway; always sent with HTTP 200.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CallbackAck {
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    #[serde(rename = "checkoutRequestId", skip_serializing_if = "Option::is_none")]
    pub checkout_request_id: Option<String>,
}

impl CallbackAck {
    fn paid(receipt: Option<&str>) -> Self {
        Self {
            status: PaymentStatus::Paid,
            receipt: receipt.map(str::to_string),
            checkout_request_id: None,
        }
    }

    fn failed(checkout_request_id: &str) -> Self {
        Self {
            status: PaymentStatus::Failed,
            receipt: None,
            checkout_request_id: Some(checkout_request_id.to_string()),
        }
    }
}

impl CallbackOutcome {
    pub fn ack(&self) -> CallbackAck {
        match self {
            CallbackOutcome::Paid { receipt, .. } => CallbackAck::paid(Some(receipt)),
            CallbackOutcome::Failed {
                checkout_request_id,
                ..
            } => CallbackAck::failed(checkout_request_id),
            CallbackOutcome::Unreconciled(event) => match &event.result {
                ReportedResult::Paid { receipt, .. } => CallbackAck::paid(receipt.as_deref()),
                ReportedResult::Failed { .. } => CallbackAck::failed(&event.checkout_request_id),
            },
        }
    }
}

pub struct PaymentCallbackUseCase<R, S>
where
    R: PaymentRepository + Send + Sync + 'static,
    S: UnreconciledCallbackSink + Send + Sync + 'static,
{
    payment_repo: Arc<R>,
    unreconciled_sink: Arc<S>,
    clock: Clock,
}

impl<R, S> PaymentCallbackUseCase<R, S>
where
    R: PaymentRepository + Send + Sync + 'static,
    S: UnreconciledCallbackSink + Send + Sync + 'static,
{
    pub fn new(payment_repo: Arc<R>, unreconciled_sink: Arc<S>) -> Self {
        Self {
            payment_repo,
            unreconciled_sink,
            clock: Arc::new(chrono::Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Applies a gateway callback to the pending payment it correlates with.
    ///
    /// Only a malformed envelope is an error. A callback that matches no pending row
    /// (early delivery, lost initiation write, replay after settlement, a row already
    /// failed or closed by an administrator), that reports success without a receipt, or
    /// that hits a store failure is handed to the unreconciled sink and still
    /// acknowledged.
    pub async fn handle_callback(&self, raw_body: &[u8]) -> PaymentResult<CallbackOutcome> {
        debug!(
            payload = %String::from_utf8_lossy(raw_body),
            "payment_callback: payload received"
        );

        let callback = StkCallbackEnvelope::parse(raw_body).map_err(|err| {
            warn!(error = %err, "payment_callback: invalid envelope");
            err
        })?;
        info!(
            checkout_request_id = %callback.checkout_request_id,
            result_code = callback.result_code,
            result_desc = ?callback.result_desc,
            "payment_callback: callback parsed"
        );

        if callback.is_success() {
            Ok(self.settle(callback).await)
        } else {
            Ok(self.fail(callback).await)
        }
    }

    async fn settle(&self, callback: StkCallback) -> CallbackOutcome {
        let reported_amount = callback.reported_amount();
        let Some(receipt) = callback.receipt() else {
            warn!(
                checkout_request_id = %callback.checkout_request_id,
                "payment_callback: success callback without receipt"
            );
            let reported = ReportedResult::Paid {
                receipt: None,
                amount: reported_amount,
            };
            return self
                .unreconciled(&callback, reported, UnreconciledReason::MissingReceipt)
                .await;
        };
        let now = (self.clock)();

        let token = CorrelationToken::pending(callback.checkout_request_id.clone());
        let changeset = SettlePaymentEntity {
            payment_status: PaymentStatus::Paid.to_string(),
            transaction_id: token.clone().settle(&receipt).column_value().to_string(),
            amount: reported_amount,
            payment_date: now.date_naive(),
            updated_at: now,
        };

        let reported = ReportedResult::Paid {
            receipt: Some(receipt.clone()),
            amount: reported_amount,
        };

        let payment = match self.payment_repo.settle_pending(token, changeset).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                let reason = self.unmatched_reason(&callback).await;
                warn!(
                    checkout_request_id = %callback.checkout_request_id,
                    receipt = %receipt,
                    reason = ?reason,
                    "payment_callback: no pending payment matched success callback"
                );
                return self.unreconciled(&callback, reported, reason).await;
            }
            Err(err) => {
                error!(
                    checkout_request_id = %callback.checkout_request_id,
                    db_error = ?err,
                    "payment_callback: failed to settle payment"
                );
                return self
                    .unreconciled(
                        &callback,
                        reported,
                        UnreconciledReason::StoreFailure(err.to_string()),
                    )
                    .await;
            }
        };
        info!(
            payment_id = payment.payment_id,
            appointment_id = payment.appointment_id,
            receipt = %receipt,
            "payment_callback: payment settled"
        );

        // Separate statement: a failure here leaves the payment paid and the
        // appointment unconfirmed.
        let appointment_confirmed = match self
            .payment_repo
            .update_appointment_status(payment.appointment_id, AppointmentStatus::Confirmed)
            .await
        {
            Ok(()) => {
                info!(
                    appointment_id = payment.appointment_id,
                    "payment_callback: appointment confirmed"
                );
                true
            }
            Err(err) => {
                error!(
                    payment_id = payment.payment_id,
                    appointment_id = payment.appointment_id,
                    db_error = ?err,
                    "payment_callback: failed to confirm appointment for paid payment"
                );
                false
            }
        };

        CallbackOutcome::Paid {
            payment_id: payment.payment_id,
            receipt,
            appointment_confirmed,
        }
    }

    async fn fail(&self, callback: StkCallback) -> CallbackOutcome {
        warn!(
            checkout_request_id = %callback.checkout_request_id,
            result_code = callback.result_code,
            result_desc = ?callback.result_desc,
            "payment_callback: payment failed or cancelled"
        );
        let token = CorrelationToken::pending(callback.checkout_request_id.clone());
        let changeset = FailPaymentEntity {
            payment_status: PaymentStatus::Failed.to_string(),
            updated_at: (self.clock)(),
        };
        let reported = ReportedResult::Failed {
            result_code: callback.result_code,
            result_desc: callback.result_desc.clone(),
        };

        match self.payment_repo.fail_pending(token, changeset).await {
            Ok(payment_ids) if !payment_ids.is_empty() => {
                info!(
                    checkout_request_id = %callback.checkout_request_id,
                    payment_ids = ?payment_ids,
                    "payment_callback: payment marked failed"
                );
                CallbackOutcome::Failed {
                    checkout_request_id: callback.checkout_request_id,
                    payment_ids,
                }
            }
            Ok(_) => {
                let reason = self.unmatched_reason(&callback).await;
                warn!(
                    checkout_request_id = %callback.checkout_request_id,
                    reason = ?reason,
                    "payment_callback: no pending payment matched failed callback"
                );
                self.unreconciled(&callback, reported, reason).await
            }
            Err(err) => {
                error!(
                    checkout_request_id = %callback.checkout_request_id,
                    db_error = ?err,
                    "payment_callback: failed to mark payment failed"
                );
                self.unreconciled(
                    &callback,
                    reported,
                    UnreconciledReason::StoreFailure(err.to_string()),
                )
                .await
            }
        }
    }

    /// Tells a row that already left `pending` apart from no row at all.
    async fn unmatched_reason(&self, callback: &StkCallback) -> UnreconciledReason {
        let rows = match self
            .payment_repo
            .find_by_transaction_id(callback.checkout_request_id.clone())
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                error!(
                    checkout_request_id = %callback.checkout_request_id,
                    db_error = ?err,
                    "payment_callback: failed to look up unmatched callback"
                );
                return UnreconciledReason::StoreFailure(err.to_string());
            }
        };

        rows.into_iter()
            .filter(|row| {
                CorrelationToken::from_stored(row.transaction_id.as_deref(), row.payment_date)
                    .is_some_and(|token| token.is_matched_by(&callback.checkout_request_id))
            })
            .find_map(|row| {
                PaymentStatus::from_str(&row.payment_status)
                    .filter(PaymentStatus::is_terminal)
                    .map(|status| UnreconciledReason::PaymentNotPending {
                        payment_id: row.payment_id,
                        status,
                    })
            })
            .unwrap_or(UnreconciledReason::NoMatchingPayment)
    }

    async fn unreconciled(
        &self,
        callback: &StkCallback,
        result: ReportedResult,
        reason: UnreconciledReason,
    ) -> CallbackOutcome {
        let event = UnreconciledCallback::new(
            callback.checkout_request_id.clone(),
            callback.merchant_request_id.clone(),
            result,
            reason,
            (self.clock)(),
        );

        if let Err(err) = self.unreconciled_sink.record(event.clone()).await {
            error!(
                event_id = %event.id,
                checkout_request_id = %event.checkout_request_id,
                error = ?err,
                "payment_callback: failed to record unreconciled callback"
            );
        }

        CallbackOutcome::Unreconciled(event)
    }
}
