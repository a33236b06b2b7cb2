use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::config::PhonePeConfig;
use crate::error::{AppError, Result};

use super::{to_minor_units, GatewayOrder, PaymentState};

const PAY_PATH: &str = "/pg/v1/pay";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayRequest<'a> {
    merchant_id: &'a str,
    merchant_transaction_id: &'a str,
    merchant_user_id: &'a str,
    /// Paise
    amount: i64,
    redirect_url: &'a str,
    callback_url: &'a str,
    payment_instrument: PaymentInstrument<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentInstrument<'a> {
    #[serde(rename = "type")]
    instrument_type: &'a str,
}

/// PhonePe wraps every request body as `{"request": base64(json)}`.
#[derive(Debug, Serialize)]
struct Envelope {
    request: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayResponse {
    success: bool,
    code: String,
    data: Option<PayResponseData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayResponseData {
    merchant_transaction_id: String,
    instrument_response: Option<InstrumentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedirectInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    code: String,
    data: Option<StatusResponseData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponseData {
    transaction_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PhonePeClient {
    client: Client,
    merchant_id: String,
    salt_key: String,
    salt_index: String,
    api_base: String,
}

impl PhonePeClient {
    pub fn new(config: &PhonePeConfig) -> Self {
        Self {
            client: Client::new(),
            merchant_id: config.merchant_id.clone(),
            salt_key: config.salt_key.clone(),
            salt_index: config.salt_index.clone(),
            api_base: config.api_base.clone(),
        }
    }

    /// PhonePe checksum: `sha256(payload + salt_key)` hex, suffixed with
    /// `###{salt_index}`. Not an HMAC - the salt key is concatenated.
    fn checksum(&self, payload: &str) -> String {
        let digest = Sha256::digest(format!("{}{}", payload, self.salt_key).as_bytes());
        format!("{}###{}", hex::encode(digest), self.salt_index)
    }

    /// Create a PhonePe payment and return the hosted-page redirect URL.
    pub async fn create_order(
        &self,
        merchant_transaction_id: &str,
        user_id: &str,
        amount: i64,
        redirect_url: &str,
        callback_url: &str,
    ) -> Result<GatewayOrder> {
        let pay = PayRequest {
            merchant_id: &self.merchant_id,
            merchant_transaction_id,
            merchant_user_id: user_id,
            amount: to_minor_units(amount)?,
            redirect_url,
            callback_url,
            payment_instrument: PaymentInstrument {
                instrument_type: "PAY_PAGE",
            },
        };

        let encoded = BASE64.encode(serde_json::to_vec(&pay)?);
        let x_verify = self.checksum(&format!("{}{}", encoded, PAY_PATH));

        let response = self
            .client
            .post(format!("{}{}", self.api_base, PAY_PATH))
            .header("X-VERIFY", x_verify)
            .json(&Envelope { request: encoded })
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("PhonePe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!("PhonePe API error: {}", error_text)));
        }

        let pay_response: PayResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse PhonePe response: {}", e)))?;

        if !pay_response.success {
            return Err(AppError::Gateway(format!("PhonePe pay rejected: {}", pay_response.code)));
        }

        let data = pay_response
            .data
            .ok_or_else(|| AppError::Gateway("PhonePe response missing data".into()))?;
        let redirect = data
            .instrument_response
            .and_then(|i| i.redirect_info)
            .map(|r| r.url)
            .ok_or_else(|| AppError::Gateway("PhonePe response missing redirect URL".into()))?;

        Ok(GatewayOrder {
            gateway_order_id: data.merchant_transaction_id,
            redirect,
        })
    }

    /// Server-to-server status check for the verify endpoint.
    /// Returns the state plus PhonePe's transaction id when present.
    pub async fn fetch_order_state(
        &self,
        merchant_transaction_id: &str,
    ) -> Result<(PaymentState, Option<String>)> {
        let path = format!(
            "/pg/v1/status/{}/{}",
            self.merchant_id, merchant_transaction_id
        );
        let x_verify = self.checksum(&path);

        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header("X-VERIFY", x_verify)
            .header("X-MERCHANT-ID", &self.merchant_id)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("PhonePe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!("PhonePe API error: {}", error_text)));
        }

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse PhonePe response: {}", e)))?;

        let state = match status.code.as_str() {
            "PAYMENT_SUCCESS" => PaymentState::Success,
            "PAYMENT_PENDING" => PaymentState::Pending,
            _ => PaymentState::Failed,
        };
        let transaction_id = status.data.and_then(|d| d.transaction_id);
        Ok((state, transaction_id))
    }

    /// Verify the webhook `X-VERIFY` header against the base64 `response`
    /// field: `sha256(base64_response + salt_key) + "###" + salt_index`.
    pub fn verify_webhook_signature(&self, base64_response: &str, x_verify: &str) -> Result<bool> {
        let expected = self.checksum(base64_response);

        // Constant-time comparison; checksum length is not secret.
        let expected_bytes = expected.as_bytes();
        let provided_bytes = x_verify.as_bytes();
        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }
        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }

}

/// Decode and parse the `{"response": base64(json)}` webhook body. Returns
/// the still-encoded response field alongside the parsed callback, since
/// the X-VERIFY checksum covers the encoded form.
pub fn decode_webhook_body(body: &[u8]) -> Result<(String, PhonePeCallback)> {
    let envelope: PhonePeWebhookEnvelope = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidArgument(format!("Invalid PhonePe webhook body: {}", e)))?;
    let decoded = BASE64
        .decode(&envelope.response)
        .map_err(|e| AppError::InvalidArgument(format!("Invalid PhonePe webhook encoding: {}", e)))?;
    let callback: PhonePeCallback = serde_json::from_slice(&decoded)
        .map_err(|e| AppError::InvalidArgument(format!("Invalid PhonePe callback payload: {}", e)))?;
    Ok((envelope.response, callback))
}

#[derive(Debug, Deserialize)]
pub struct PhonePeWebhookEnvelope {
    pub response: String,
}

/// Typed PhonePe callback (the decoded `response` field).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonePeCallback {
    pub code: String,
    pub data: Option<PhonePeCallbackData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonePeCallbackData {
    pub merchant_transaction_id: String,
    pub transaction_id: Option<String>,
    pub state: Option<String>,
    /// Paise
    pub amount: Option<i64>,
}
