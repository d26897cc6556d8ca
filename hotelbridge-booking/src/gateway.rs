use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use constant_time_eq::constant_time_eq;
use hotelbridge_core::payment::{GatewayCallback, GatewayOrder, PaymentGateway, RedirectForm};
use hotelbridge_core::{BookingError, BookingResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const NONCE_LEN: usize = 12;
const APPROVED_STATUS: &str = "Success";

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub merchant_id: String,
    pub access_code: String,
    pub working_key: String,
    pub action_url: String,
    pub redirect_url: String,
}

/// Order document handed to the gateway inside `enc_request`.
#[derive(Debug, Serialize, Deserialize)]
struct GatewayRequest {
    merchant_id: String,
    order_id: String,
    amount: Decimal,
    currency: String,
    redirect_url: String,
    cancel_url: String,
    billing_name: String,
    billing_email: String,
    billing_tel: String,
}

/// Result document the gateway posts back, encrypted, to the callback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayResult {
    pub order_id: String,
    pub amount: Decimal,
    pub order_status: String,
    #[serde(default)]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

/// Redirect-and-callback card/UPI gateway.
///
/// Payloads are AES-256-GCM under a key derived from the merchant working key
/// and travel as base64(`nonce || ciphertext`). Callbacks are signed with
/// hex SHA-256 over `working_key || payload`.
pub struct AesGatewayAdapter {
    settings: GatewaySettings,
    cipher: Aes256Gcm,
}

impl AesGatewayAdapter {
    pub fn new(settings: GatewaySettings) -> BookingResult<Self> {
        let key = Sha256::digest(settings.working_key.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| BookingError::Internal(format!("Invalid gateway key: {}", e)))?;
        Ok(Self { settings, cipher })
    }

    fn encrypt(&self, plaintext: &[u8]) -> BookingResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| BookingError::Internal(format!("Gateway encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn decrypt(&self, payload: &str) -> BookingResult<Vec<u8>> {
        let sealed = STANDARD
            .decode(payload.trim())
            .map_err(|_| BookingError::PaymentVerificationFailed("Callback payload is not base64".to_string()))?;
        if sealed.len() <= NONCE_LEN {
            return Err(BookingError::PaymentVerificationFailed("Callback payload is truncated".to_string()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::clone_from_slice(nonce_bytes);
        self.cipher
            .decrypt(&nonce, ciphertext)
            .map_err(|_| BookingError::PaymentVerificationFailed("Callback payload failed to decrypt".to_string()))
    }

    fn sign(&self, payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.settings.working_key.as_bytes());
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Encrypts and signs a result document the way the gateway does.
    /// Used by the sandbox callback and by tests.
    pub fn seal_result(&self, result: &GatewayResult) -> BookingResult<(String, String)> {
        let json = serde_json::to_vec(result).map_err(|e| BookingError::Internal(e.to_string()))?;
        let payload = self.encrypt(&json)?;
        let signature = self.sign(&payload);
        Ok((payload, signature))
    }
}

#[async_trait]
impl PaymentGateway for AesGatewayAdapter {
    async fn initiate(&self, order: &GatewayOrder) -> BookingResult<RedirectForm> {
        let request = GatewayRequest {
            merchant_id: self.settings.merchant_id.clone(),
            order_id: order.reference.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            redirect_url: self.settings.redirect_url.clone(),
            cancel_url: self.settings.redirect_url.clone(),
            billing_name: order.billing_name.clone(),
            billing_email: order.billing_email.expose().clone(),
            billing_tel: order.billing_phone.expose().clone(),
        };
        let json = serde_json::to_vec(&request).map_err(|e| BookingError::Internal(e.to_string()))?;
        let enc_request = self.encrypt(&json)?;
        debug!("Gateway order prepared for {}", order.reference);

        let fields = BTreeMap::from([
            ("enc_request".to_string(), enc_request),
            ("access_code".to_string(), self.settings.access_code.clone()),
            ("merchant_id".to_string(), self.settings.merchant_id.clone()),
        ]);

        Ok(RedirectForm {
            action_url: self.settings.action_url.clone(),
            method: "POST".to_string(),
            fields,
        })
    }

    fn verify_callback(&self, raw_payload: &str, signature: &str) -> BookingResult<GatewayCallback> {
        let expected = self.sign(raw_payload);
        if !constant_time_eq(expected.as_bytes(), signature.trim().to_ascii_lowercase().as_bytes()) {
            warn!(target: "security", "Gateway callback signature mismatch");
            return Err(BookingError::PaymentVerificationFailed("Invalid callback signature".to_string()));
        }

        let plaintext = self.decrypt(raw_payload)?;
        let result: GatewayResult = serde_json::from_slice(&plaintext)
            .map_err(|e| BookingError::PaymentVerificationFailed(format!("Malformed callback document: {}", e)))?;

        Ok(GatewayCallback {
            approved: result.order_status == APPROVED_STATUS,
            amount: result.amount,
            reference: result.order_id,
            gateway_txn_id: result.tracking_id,
            status_message: result.status_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotelbridge_shared::Masked;
    use rust_decimal_macros::dec;

    fn adapter() -> AesGatewayAdapter {
        AesGatewayAdapter::new(GatewaySettings {
            merchant_id: "M-1".to_string(),
            access_code: "AC-1".to_string(),
            working_key: "working-key".to_string(),
            action_url: "https://pay.example.com/transaction".to_string(),
            redirect_url: "https://hotelbridge.example.com/v1/payments/gateway/callback".to_string(),
        })
        .unwrap()
    }

    fn result(status: &str) -> GatewayResult {
        GatewayResult {
            order_id: "txn-1".to_string(),
            amount: dec!(4200),
            order_status: status.to_string(),
            tracking_id: Some("GW-77".to_string()),
            status_message: None,
        }
    }

    #[tokio::test]
    async fn test_redirect_form_carries_encrypted_order() {
        let gateway = adapter();
        let order = GatewayOrder {
            reference: "txn-1".to_string(),
            amount: dec!(4200),
            currency: "INR".to_string(),
            billing_name: "Asha Rao".to_string(),
            billing_email: Masked::new("asha@example.com".to_string()),
            billing_phone: Masked::new("9820012345".to_string()),
        };

        let form = gateway.initiate(&order).await.unwrap();
        assert_eq!(form.method, "POST");
        assert_eq!(form.fields["access_code"], "AC-1");
        assert_eq!(form.fields["merchant_id"], "M-1");

        let decrypted = gateway.decrypt(&form.fields["enc_request"]).unwrap();
        let request: GatewayRequest = serde_json::from_slice(&decrypted).unwrap();
        assert_eq!(request.order_id, "txn-1");
        assert_eq!(request.amount, dec!(4200));
        assert_eq!(request.billing_email, "asha@example.com");
    }

    #[test]
    fn test_sealed_result_verifies() {
        let gateway = adapter();
        let (payload, signature) = gateway.seal_result(&result("Success")).unwrap();
        let callback = gateway.verify_callback(&payload, &signature).unwrap();
        assert!(callback.approved);
        assert_eq!(callback.reference, "txn-1");
        assert_eq!(callback.gateway_txn_id.as_deref(), Some("GW-77"));

        let (payload, signature) = gateway.seal_result(&result("Failure")).unwrap();
        assert!(!gateway.verify_callback(&payload, &signature).unwrap().approved);
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let gateway = adapter();
        let (payload, signature) = gateway.seal_result(&result("Success")).unwrap();

        let mut forged = payload.clone();
        forged.push('A');
        assert!(matches!(
            gateway.verify_callback(&forged, &signature),
            Err(BookingError::PaymentVerificationFailed(_))
        ));
        assert!(matches!(
            gateway.verify_callback(&payload, "00"),
            Err(BookingError::PaymentVerificationFailed(_))
        ));
    }

    #[test]
    fn test_other_merchant_key_cannot_forge() {
        let other = AesGatewayAdapter::new(GatewaySettings {
            working_key: "someone-else".to_string(),
            ..adapter().settings.clone()
        })
        .unwrap();
        let (payload, signature) = other.seal_result(&result("Success")).unwrap();
        assert!(adapter().verify_callback(&payload, &signature).is_err());
    }
}
