//! # Payment Gateway Seam
//!
//! The engine never talks to a payment provider directly. It consumes the
//! [`PaymentGateway`] trait, and every call through it is bounded by the
//! configured gateway timeout.
//!
//! ## Flows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  initiate payment ──► create_charge(order_id, net_total)               │
//! │                            │                                            │
//! │                            ▼                                            │
//! │                     transaction_id stored as payment_gateway_reference │
//! │                                                                         │
//! │  cancel order ──────► cancel(order_id)   (must succeed before the      │
//! │                                           local cancellation commits)  │
//! │                                                                         │
//! │  notification ──────► verify_signature(payload)                        │
//! │                            │ ok                                         │
//! │                            ▼                                            │
//! │                     map transaction_status → paid / cancelled / ignore │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tally_core::Money;
use thiserror::Error;

/// Failures reported by a gateway implementation.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway call timed out after {0} ms")]
    Timeout(u64),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    #[error("gateway unreachable: {0}")]
    Transport(String),
}

/// A follow-up action the payer can take (redirect URL, QR image, deeplink).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeAction {
    pub name: String,
    pub method: String,
    pub url: String,
}

/// Result of a successful charge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub transaction_id: String,
    pub actions: Vec<ChargeAction>,
    pub expiry: Option<DateTime<Utc>>,
}

/// The notification fields the engine consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayNotification {
    pub order_id: String,
    pub transaction_id: String,
    pub transaction_status: String,
    /// As sent by the gateway, e.g. `"18000.00"`.
    pub gross_amount: String,
    pub status_code: String,
    pub signature_key: String,
}

/// Payment provider operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_charge(&self, order_id: &str, amount: Money) -> Result<ChargeResponse, GatewayError>;

    async fn cancel(&self, order_id: &str) -> Result<(), GatewayError>;

    /// Whether the notification was really sent by the gateway.
    fn verify_signature(&self, notification: &GatewayNotification) -> bool;
}

/// Lowercase hex SHA-512 of `order_id + status_code + gross_amount + server_key`.
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verifies notifications signed with a shared server key.
///
/// Gateway implementations delegate `verify_signature` to this.
#[derive(Clone)]
pub struct ServerKeyVerifier {
    server_key: String,
}

impl ServerKeyVerifier {
    pub fn new(server_key: impl Into<String>) -> Self {
        ServerKeyVerifier {
            server_key: server_key.into(),
        }
    }

    pub fn verify(&self, notification: &GatewayNotification) -> bool {
        let expected = notification_signature(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            &self.server_key,
        );
        let Ok(supplied) = hex::decode(notification.signature_key.trim()) else {
            return false;
        };
        match hex::decode(expected) {
            Ok(expected) => constant_time_eq(&expected, &supplied),
            Err(_) => false,
        }
    }
}

/// Compares every byte regardless of where the first difference is.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

impl std::fmt::Debug for ServerKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeyVerifier")
            .field("server_key", &"<redacted>")
            .finish()
    }
}
