//! VAPID keys for Web Push (RFC 8292).
//!
//! The server authenticates itself to push services with a P-256 ECDSA
//! keypair. Keys are supplied at startup (`VAPID_PUBLIC_KEY` /
//! `VAPID_PRIVATE_KEY`) in the same base64url form the `web-push` npm tool
//! prints, so existing browser subscriptions keep working.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;

const PUBLIC_KEY_LEN: usize = 65;
const PRIVATE_KEY_LEN: usize = 32;

/// Server identity toward push services.
///
/// `private` is the raw P-256 scalar and `public` the uncompressed SEC1
/// point, both base64url without padding. The scalar form is what
/// `VapidSignatureBuilder::from_base64` takes.
#[derive(Clone)]
pub struct VapidKeys {
    private: String,
    public: String,
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public", &self.public)
            .field("private", &"<redacted>")
            .finish()
    }
}

impl VapidKeys {
    /// Fresh random keypair.
    pub fn generate() -> Self {
        Self::from_signing_key(&SigningKey::random(&mut OsRng))
    }

    fn from_signing_key(key: &SigningKey) -> Self {
        let point = key.verifying_key().to_encoded_point(false);
        Self {
            private: BASE64URL.encode(key.to_bytes()),
            public: BASE64URL.encode(point.as_bytes()),
        }
    }

    /// The `applicationServerKey` browsers subscribe with.
    pub fn public_key_base64url(&self) -> &str {
        &self.public
    }

    /// Private scalar, for signing.
    pub fn private_key_base64url(&self) -> &str {
        &self.private
    }

    /// Parse and validate a configured pair.
    ///
    /// Padding and surrounding whitespace are tolerated. The public key must
    /// be the one derived from the private key; a mismatched pair would sign
    /// with a key no browser subscribed against.
    pub fn from_base64url(public: &str, private: &str) -> Result<Self> {
        let public_bytes = decode("public", public)?;
        anyhow::ensure!(
            public_bytes.len() == PUBLIC_KEY_LEN && public_bytes[0] == 0x04,
            "VAPID public key must decode to a {PUBLIC_KEY_LEN}-byte uncompressed point, got {} bytes",
            public_bytes.len()
        );

        let private_bytes = decode("private", private)?;
        anyhow::ensure!(
            private_bytes.len() == PRIVATE_KEY_LEN,
            "VAPID private key must decode to {PRIVATE_KEY_LEN} bytes, got {}",
            private_bytes.len()
        );
        let signing_key = SigningKey::from_slice(&private_bytes)
            .context("VAPID private key is not a usable P-256 scalar")?;

        let keys = Self::from_signing_key(&signing_key);
        anyhow::ensure!(
            BASE64URL.encode(&public_bytes) == keys.public,
            "VAPID public key does not match the private key"
        );
        Ok(keys)
    }

    /// `.env` snippet printed by `eznotif generate-vapid-keys`.
    pub fn to_env_lines(&self) -> String {
        format!("VAPID_PUBLIC_KEY={}\nVAPID_PRIVATE_KEY={}", self.public, self.private)
    }
}

fn decode(which: &str, value: &str) -> Result<Vec<u8>> {
    BASE64URL
        .decode(value.trim().trim_end_matches('='))
        .with_context(|| format!("VAPID {which} key is not base64url"))
}
