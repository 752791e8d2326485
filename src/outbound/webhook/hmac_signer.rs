use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature on every delivery
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Error type for signing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("webhook secret is missing")]
    MissingSecret,
}

/// HMAC-SHA256 signer for webhook payloads
pub struct HmacSigner {
    secret: String,
}

impl HmacSigner {
    /// New HMAC signer; an empty secret cannot sign anything
    pub fn new(secret: impl Into<String>) -> Result<Self, SignerError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SignerError::MissingSecret);
        }
        Ok(Self { secret })
    }

    /// Lowercase hex HMAC-SHA256 of the payload
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a received hex signature in constant time.
    ///
    /// This is what a merchant's server does on receipt.
    pub fn verify(&self, payload: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn mac(&self) -> HmacSha256 {
        match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC key can be of any size, as per crate documentation"),
        }
    }
}

/// Sign `payload` with `secret`
pub fn sign(payload: &str, secret: &str) -> Result<String, SignerError> {
    Ok(HmacSigner::new(secret)?.sign(payload))
}
