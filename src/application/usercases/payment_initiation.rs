use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::{
    config::config_model::MpesaConfig,
    domain::{
        entities::payments::InsertPaymentEntity,
        repositories::payments::PaymentRepository,
        value_objects::{
            correlation_token::CorrelationToken,
            enums::payment_statuses::PaymentStatus,
            mpesa::{AccessToken, StkPushAcceptance, StkPushParams, StkPushRequest},
            payment_errors::{PaymentError, PaymentResult},
            payments::{InitiatePaymentModel, InitiatedPaymentDto, to_stored_amount},
        },
    },
    infrastructure::mpesa::{mpesa_client::MpesaClient, request_signer::RequestSigner},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MpesaGateway: Send + Sync {
    async fn acquire_token(&self) -> PaymentResult<AccessToken>;

    async fn send_stk_push(
        &self,
        token: &AccessToken,
        request: &StkPushRequest,
    ) -> PaymentResult<StkPushAcceptance>;
}

#[async_trait]
impl MpesaGateway for MpesaClient {
    async fn acquire_token(&self) -> PaymentResult<AccessToken> {
        self.acquire_token().await
    }

    async fn send_stk_push(
        &self,
        token: &AccessToken,
        request: &StkPushRequest,
    ) -> PaymentResult<StkPushAcceptance> {
        self.send_stk_push(token, request).await
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct PaymentInitiationUseCase<G, R>
where
    G: MpesaGateway + 'static,
    R: PaymentRepository + Send + Sync + 'static,
{
    gateway: Arc<G>,
    payment_repo: Arc<R>,
    signer: RequestSigner,
    shortcode: String,
    callback_base_url: String,
    clock: Clock,
}

impl<G, R> PaymentInitiationUseCase<G, R>
where
    G: MpesaGateway + 'static,
    R: PaymentRepository + Send + Sync + 'static,
{
    pub fn new(gateway: Arc<G>, payment_repo: Arc<R>, config: &MpesaConfig) -> AnyResult<Self> {
        let signer = RequestSigner::new(
            config.shortcode.clone(),
            config.passkey.clone(),
            config.utc_offset()?,
        );

        Ok(Self {
            gateway,
            payment_repo,
            signer,
            shortcode: config.shortcode.clone(),
            callback_base_url: config.callback_base_url.clone(),
            clock: Arc::new(Utc::now),
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sends an STK push for an appointment and records a pending payment keyed by the
    /// gateway's checkout-request id. Nothing is written unless the gateway accepted
    /// the push.
    pub async fn initiate(
        &self,
        request: InitiatePaymentModel,
    ) -> PaymentResult<InitiatedPaymentDto> {
        let command = request.validate().map_err(|err| {
            warn!(error = %err, "payment_initiation: rejected request");
            err
        })?;
        info!(
            appointment_id = command.appointment_id,
            user_id = ?command.user_id,
            amount = %command.amount,
            "payment_initiation: initiating stk push"
        );

        let now = (self.clock)();
        let signed = self.signer.sign(now);

        let token = self.gateway.acquire_token().await.map_err(|err| {
            error!(
                appointment_id = command.appointment_id,
                error = %err,
                "payment_initiation: failed to acquire gateway token"
            );
            err
        })?;

        let stk_request = StkPushRequest::new(StkPushParams {
            shortcode: &self.shortcode,
            signed,
            amount: command.amount,
            phone_number: &command.phone_number,
            callback_base_url: &self.callback_base_url,
            appointment_id: command.appointment_id,
        });

        let accepted = self
            .gateway
            .send_stk_push(&token, &stk_request)
            .await
            .map_err(|err| {
                error!(
                    appointment_id = command.appointment_id,
                    error = %err,
                    "payment_initiation: stk push was not accepted"
                );
                err
            })?;
        info!(
            appointment_id = command.appointment_id,
            checkout_request_id = %accepted.checkout_request_id,
            merchant_request_id = %accepted.merchant_request_id,
            "payment_initiation: stk push accepted"
        );

        let token = CorrelationToken::pending(accepted.checkout_request_id.clone());
        let pending = InsertPaymentEntity {
            appointment_id: command.appointment_id,
            amount: to_stored_amount(command.amount),
            payment_status: PaymentStatus::Pending.to_string(),
            user_id: command.user_id,
            transaction_id: Some(token.column_value().to_string()),
            created_at: now,
            updated_at: now,
        };

        // The gateway has already accepted the push; a failure here leaves a payment
        // the callback will not be able to match.
        let payment_id = self
            .payment_repo
            .insert_pending(pending)
            .await
            .map_err(|err| {
                error!(
                    appointment_id = command.appointment_id,
                    checkout_request_id = %accepted.checkout_request_id,
                    db_error = ?err,
                    "payment_initiation: accepted stk push could not be recorded"
                );
                PaymentError::Persistence(err)
            })?;
        info!(
            payment_id,
            appointment_id = command.appointment_id,
            "payment_initiation: pending payment recorded"
        );

        Ok(InitiatedPaymentDto::from(accepted))
    }
}
