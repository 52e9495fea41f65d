use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Produces and checks the keyed tag that links an entry to its predecessor.
///
/// `tag = HMAC-SHA256(secret, prev_hash ":" content_hash)`, where a genesis
/// entry contributes the empty string (not `"null"`) for `prev_hash`.
#[derive(Clone)]
pub struct ChainSigner {
    mac: HmacSha256,
}

impl ChainSigner {
    /// Key a signer with the shared chain secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, CryptoError> {
        let mac = <HmacSha256 as Mac>::new_from_slice(secret.as_ref())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }

    /// The material fed to the MAC for one link.
    pub fn link_material(prev_hash: Option<&str>, content_hash: &str) -> String {
        format!("{}:{}", prev_hash.unwrap_or(""), content_hash)
    }

    /// Hex chain tag for `content_hash` following `prev_hash`.
    pub fn tag(&self, prev_hash: Option<&str>, content_hash: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(Self::link_material(prev_hash, content_hash).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a hex tag. Malformed hex never verifies.
    pub fn verify(&self, prev_hash: Option<&str>, content_hash: &str, tag: &str) -> bool {
        let Ok(expected) = hex::decode(tag) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(Self::link_material(prev_hash, content_hash).as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

impl std::fmt::Debug for ChainSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainSigner").field("secret", &"<redacted>").finish()
    }
}
