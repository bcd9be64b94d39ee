//! Stripe webhook configuration

use serde::Deserialize;

use crate::domain::webhook::{RedeliveryPolicy, StripeWebhookVerifier, DEFAULT_TOLERANCE_SECS};

use super::error::ValidationError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    /// Endpoint signing secret (whsec_xxx).
    pub stripe_webhook_secret: String,

    /// Maximum age of a signed timestamp.
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,

    /// Handling of redelivered events that never finished processing.
    #[serde(default)]
    pub redelivery_policy: RedeliveryPolicy,
}

impl PaymentConfig {
    /// Builds the signature verifier for the configured secret.
    pub fn verifier(&self) -> StripeWebhookVerifier {
        StripeWebhookVerifier::new(self.stripe_webhook_secret.clone())
            .with_tolerance_secs(self.signature_tolerance_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_WEBHOOK_SECRET"));
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if !(1..=3600).contains(&self.signature_tolerance_secs) {
            return Err(ValidationError::InvalidSignatureTolerance);
        }
        Ok(())
    }
}

fn default_signature_tolerance() -> i64 {
    DEFAULT_TOLERANCE_SECS
}
