//! Authenticated Signer
//!
//! Produces the keyed-hash signature the exchange verifies server-side:
//! hex-encoded HMAC-SHA256 over the UTF-8 bytes of the exact query string
//! being sent. Field order in the payload is significant; the signer never
//! reorders or re-encodes anything.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use once_cell::sync::OnceCell;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing key could not be initialized")]
    KeyInit,
}

/// Capability seam for request signing. Async because the underlying
/// primitive may need a capability handshake on first use in some host
/// runtimes; implementations lazily derive and cache key material.
#[async_trait]
pub trait RequestSigner: Send + Sync {
    async fn sign(&self, payload: &str) -> Result<String, SignerError>;
}

/// HMAC-SHA256 signer over a locally held secret.
pub struct HmacSha256Signer {
    secret: Zeroizing<String>,
    mac: OnceCell<HmacSha256>,
}

impl HmacSha256Signer {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Zeroizing::new(secret.to_string()),
            mac: OnceCell::new(),
        }
    }

    fn mac(&self) -> Result<&HmacSha256, SignerError> {
        self.mac.get_or_try_init(|| {
            HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| SignerError::KeyInit)
        })
    }
}

// Never expose the secret, not even in debug output.
impl std::fmt::Debug for HmacSha256Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSha256Signer").finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestSigner for HmacSha256Signer {
    async fn sign(&self, payload: &str) -> Result<String, SignerError> {
        let mut mac = self.mac()?.clone();
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
