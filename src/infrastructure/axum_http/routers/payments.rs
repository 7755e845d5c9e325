use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::info;

use crate::{
    application::usercases::{
        payment_callback::PaymentCallbackUseCase,
        payment_initiation::{MpesaGateway, PaymentInitiationUseCase},
        payments::PaymentQueryUseCase,
    },
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::{
            payments::PaymentRepository, unreconciled_callbacks::UnreconciledCallbackSink,
        },
        value_objects::{payment_errors::PaymentError, payments::InitiatePaymentModel},
    },
    infrastructure::{
        mpesa::mpesa_client::MpesaClient,
        postgres::{postgres_connection::PgPoolSquad, repositories::payments::PaymentPostgres},
        unreconciled_callbacks::UnreconciledCallbackLog,
    },
};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Result<Router> {
    let payment_repository = Arc::new(PaymentPostgres::new(Arc::clone(&db_pool)));
    let mpesa_client = Arc::new(MpesaClient::new(&config.mpesa));
    let unreconciled_sink = Arc::new(UnreconciledCallbackLog::new(
        config.alerts.unreconciled_webhook_url.clone(),
    ));

    let initiation_usecase = PaymentInitiationUseCase::new(
        mpesa_client,
        Arc::clone(&payment_repository),
        &config.mpesa,
    )?;
    let callback_usecase =
        PaymentCallbackUseCase::new(Arc::clone(&payment_repository), unreconciled_sink);
    let query_usecase = PaymentQueryUseCase::new(payment_repository);

    Ok(router(
        Arc::new(initiation_usecase),
        Arc::new(callback_usecase),
        Arc::new(query_usecase),
    ))
}

pub fn router<G, R, S>(
    initiation_usecase: Arc<PaymentInitiationUseCase<G, R>>,
    callback_usecase: Arc<PaymentCallbackUseCase<R, S>>,
    query_usecase: Arc<PaymentQueryUseCase<R>>,
) -> Router
where
    G: MpesaGateway + 'static,
    R: PaymentRepository + Send + Sync + 'static,
    S: UnreconciledCallbackSink + Send + Sync + 'static,
{
    let callback_routes: Router = Router::new()
        .route("/payment-callback", post(payment_callback::<R, S>))
        .with_state(callback_usecase);

    let query_routes: Router = Router::new()
        .route("/", get(list_payments::<R>))
        .route("/:payment_id", get(find_payment::<R>))
        .route(
            "/appointment/:appointment_id",
            get(list_for_appointment::<R>),
        )
        .with_state(query_usecase);

    Router::new()
        .route("/initiate", post(initiate::<G, R>))
        .with_state(initiation_usecase)
        .merge(callback_routes)
        .merge(query_routes)
}

pub async fn initiate<G, R>(
    State(initiation_usecase): State<Arc<PaymentInitiationUseCase<G, R>>>,
    payload: Result<Json<InitiatePaymentModel>, JsonRejection>,
) -> Response
where
    G: MpesaGateway + 'static,
    R: PaymentRepository + Send + Sync + 'static,
{
    let Json(initiate_payment_model) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return PaymentError::validation(rejection.body_text()).into_response(),
    };

    match initiation_usecase.initiate(initiate_payment_model).await {
        Ok(initiated) => (StatusCode::OK, Json(initiated)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// The gateway only needs a 200 to stop redelivering; every well-formed callback
/// gets one, reconciled or not.
pub async fn payment_callback<R, S>(
    State(callback_usecase): State<Arc<PaymentCallbackUseCase<R, S>>>,
    body: Bytes,
) -> Response
where
    R: PaymentRepository + Send + Sync + 'static,
    S: UnreconciledCallbackSink + Send + Sync + 'static,
{
    info!(bytes = body.len(), "payment_callback: callback received");

    match callback_usecase.handle_callback(&body).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.ack())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn list_payments<R>(
    State(query_usecase): State<Arc<PaymentQueryUseCase<R>>>,
) -> Response
where
    R: PaymentRepository + Send + Sync + 'static,
{
    match query_usecase.list_payments().await {
        Ok(payments) => (StatusCode::OK, Json(payments)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn find_payment<R>(
    State(query_usecase): State<Arc<PaymentQueryUseCase<R>>>,
    Path(payment_id): Path<i32>,
) -> Response
where
    R: PaymentRepository + Send + Sync + 'static,
{
    match query_usecase.find_payment(payment_id).await {
        Ok(payment) => (StatusCode::OK, Json(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn list_for_appointment<R>(
    State(query_usecase): State<Arc<PaymentQueryUseCase<R>>>,
    Path(appointment_id): Path<i32>,
) -> Response
where
    R: PaymentRepository + Send + Sync + 'static,
{
    match query_usecase.list_for_appointment(appointment_id).await {
        Ok(payments) => (StatusCode::OK, Json(payments)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::usercases::payment_initiation::MockMpesaGateway,
        config::config_model::MpesaConfig,
        domain::{
            entities::payments::PaymentEntity,
            repositories::{
                payments::MockPaymentRepository,
                unreconciled_callbacks::MockUnreconciledCallbackSink,
            },
        },
    };
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    fn mpesa_config() -> MpesaConfig {
        MpesaConfig {
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            shortcode: "174379".to_string(),
            passkey: "passkey".to_string(),
            callback_base_url: "https://clinic.example.com".to_string(),
            api_base_url: "https://sandbox.safaricom.co.ke".to_string(),
            utc_offset_hours: 3,
        }
    }

    async fn serve(
        gateway: MockMpesaGateway,
        repo: MockPaymentRepository,
        sink: MockUnreconciledCallbackSink,
    ) -> String {
        let repo = Arc::new(repo);
        let initiation =
            PaymentInitiationUseCase::new(Arc::new(gateway), Arc::clone(&repo), &mpesa_config())
                .unwrap();
        let callback = PaymentCallbackUseCase::new(Arc::clone(&repo), Arc::new(sink));
        let queries = PaymentQueryUseCase::new(repo);
        let app = Router::new().nest(
            "/payments",
            router(Arc::new(initiation), Arc::new(callback), Arc::new(queries)),
        );

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn callback_is_acknowledged_with_the_receipt() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_settle_pending().returning(|_, changeset| {
            let at = Utc.with_ymd_and_hms(2025, 3, 14, 6, 30, 0).unwrap();
            Ok(Some(PaymentEntity {
                payment_id: 42,
                appointment_id: 1,
                amount: dec!(1200.00),
                payment_status: changeset.payment_status,
                user_id: Some(7),
                transaction_id: Some(changeset.transaction_id),
                payment_date: Some(changeset.payment_date),
                created_at: at,
                updated_at: at,
            }))
        });
        repo.expect_update_appointment_status()
            .returning(|_, _| Ok(()));
        let base = serve(
            MockMpesaGateway::new(),
            repo,
            MockUnreconciledCallbackSink::new(),
        )
        .await;

        let response = reqwest::Client::new()
            .post(format!("{base}/payments/payment-callback?paymentid=1"))
            .json(&json!({
                "Body": { "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_123",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": { "Item": [
                        { "Name": "MpesaReceiptNumber", "Value": "QAX123" },
                        { "Name": "Amount", "Value": 1200 }
                    ]}
                }}
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "status": "paid", "receipt": "QAX123" }));
    }

    #[tokio::test]
    async fn malformed_callback_is_a_bad_request() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_settle_pending().times(0);
        let base = serve(
            MockMpesaGateway::new(),
            repo,
            MockUnreconciledCallbackSink::new(),
        )
        .await;

        let response = reqwest::Client::new()
            .post(format!("{base}/payments/payment-callback"))
            .body("not json")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn success_callback_without_receipt_is_still_acknowledged() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_settle_pending().times(0);
        let mut sink = MockUnreconciledCallbackSink::new();
        sink.expect_record().times(1).returning(|_| Ok(()));
        let base = serve(MockMpesaGateway::new(), repo, sink).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/payments/payment-callback"))
            .json(&json!({
                "Body": { "stkCallback": {
                    "CheckoutRequestID": "ws_CO_123",
                    "ResultCode": 0,
                    "ResultDesc": "ok"
                }}
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "status": "paid" }));
    }

    #[tokio::test]
    async fn lists_every_payment() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_list_all().returning(|| Ok(Vec::new()));
        let base = serve(
            MockMpesaGateway::new(),
            repo,
            MockUnreconciledCallbackSink::new(),
        )
        .await;

        let response = reqwest::get(format!("{base}/payments")).await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn initiate_rejects_non_positive_amounts_with_bad_request() {
        let mut gateway = MockMpesaGateway::new();
        gateway.expect_acquire_token().times(0);
        let base = serve(
            gateway,
            MockPaymentRepository::new(),
            MockUnreconciledCallbackSink::new(),
        )
        .await;

        let response = reqwest::Client::new()
            .post(format!("{base}/payments/initiate"))
            .json(&json!({ "appointment_id": 1, "phoneNumber": "0712345678", "amount": 0 }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn initiate_reports_unparseable_bodies_as_validation_errors() {
        let base = serve(
            MockMpesaGateway::new(),
            MockPaymentRepository::new(),
            MockUnreconciledCallbackSink::new(),
        )
        .await;

        let response = reqwest::Client::new()
            .post(format!("{base}/payments/initiate"))
            .header("content-type", "application/json")
            .body("{\"amount\": ")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_payment_is_not_found() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        let base = serve(
            MockMpesaGateway::new(),
            repo,
            MockUnreconciledCallbackSink::new(),
        )
        .await;

        let response = reqwest::get(format!("{base}/payments/404"))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
