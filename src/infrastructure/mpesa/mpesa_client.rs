use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{error, info};

use crate::{
    config::config_model::MpesaConfig,
    domain::value_objects::{
        mpesa::{AccessToken, StkPushAcceptance, StkPushRequest, TokenResponse},
        payment_errors::{PaymentError, PaymentResult},
    },
};

const TOKEN_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";

/// Daraja (M-Pesa) client built on reqwest. Only the two calls STK push needs.
pub struct MpesaClient {
    http: reqwest::Client,
    api_base_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl MpesaClient {
    pub fn new(config: &MpesaConfig) -> Self {
        Self {
            // No explicit timeout: the client's defaults bound both round trips.
            http: reqwest::Client::new(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
        }
    }

    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.consumer_key, self.consumer_secret);
        format!("Basic {}", STANDARD.encode(credentials))
    }

    /// Fetches a fresh OAuth token. Tokens are not cached.
    pub async fn acquire_token(&self) -> PaymentResult<AccessToken> {
        let resp = self
            .http
            .get(format!("{}{}", self.api_base_url, TOKEN_PATH))
            .header(AUTHORIZATION, self.basic_auth())
            .send()
            .await
            .map_err(|err| sanitize_reqwest_error("token", err))?;

        let status = resp.status();
        if !status.is_success() {
            error!(
                status = %status,
                "mpesa: token endpoint returned non-success status"
            );
            return Err(PaymentError::GatewayAuth {
                status: status.as_u16(),
            });
        }

        let body = read_body(resp).await?;
        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|err| {
            PaymentError::GatewayProtocol(format!("failed to parse token response: {err}"))
        })?;

        Ok(AccessToken::new(parsed.access_token))
    }

    /// Sends the STK push. The body is read as text first because the gateway
    /// answers some failures with HTML or plain text.
    pub async fn send_stk_push(
        &self,
        token: &AccessToken,
        request: &StkPushRequest,
    ) -> PaymentResult<StkPushAcceptance> {
        let resp = self
            .http
            .post(format!("{}{}", self.api_base_url, STK_PUSH_PATH))
            .header(AUTHORIZATION, format!("Bearer {}", token.as_str()))
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|err| sanitize_reqwest_error("stk push", err))?;

        let status = resp.status();
        let body = read_body(resp).await?;
        info!(
            status = %status,
            account_reference = %request.account_reference,
            response_body = %body,
            "mpesa: stk push raw response"
        );

        if !status.is_success() {
            error!(
                status = %status,
                account_reference = %request.account_reference,
                response_body = %body,
                "mpesa: stk push request failed"
            );
            return Err(PaymentError::GatewayRequest {
                status: status.as_u16(),
                body,
            });
        }

        StkPushAcceptance::parse(&body)
    }
}

async fn read_body(resp: reqwest::Response) -> PaymentResult<String> {
    resp.text()
        .await
        .map_err(|err| sanitize_reqwest_error("read body", err))
}

// reqwest errors embed the request URL; keep the message to its kind.
fn sanitize_reqwest_error(context: &str, error: reqwest::Error) -> PaymentError {
    let kind = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else if error.is_body() || error.is_decode() {
        "could not read response"
    } else {
        "request failed"
    };
    error!(context, error = %error, "mpesa: transport error");
    PaymentError::GatewayUnavailable(format!("{context} {kind}"))
}
