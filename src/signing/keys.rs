//! Actor key material
//!
//! Each board identity owns one Ed25519 keypair, generated on first start
//! and persisted in the data directory. The private key never leaves the
//! process; counterparts learn the public key from the actor document.

use base64::Engine;
use dashmap::DashMap;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::types::{BoardError, Result};

/// Persisted key file shape
#[derive(Serialize, Deserialize)]
struct StoredKey {
    /// Base64 of the 32-byte Ed25519 seed
    secret: String,
    /// Base64 of the public key, kept for inspection
    public: String,
}

/// The board's signing identity
pub struct ActorKeys {
    signing_key: SigningKey,
    /// Key URL advertised in the actor document, `<actor>#main-key`
    pub key_id: String,
}

impl ActorKeys {
    /// Load the persisted keypair, generating and persisting one if absent.
    pub fn load_or_generate(path: &Path, key_id: String) -> Result<Self> {
        if path.exists() {
            let stored: StoredKey = serde_json::from_slice(&std::fs::read(path)?)
                .map_err(|e| BoardError::Internal(format!("key file corrupt: {}", e)))?;
            let seed = base64::engine::general_purpose::STANDARD
                .decode(&stored.secret)
                .map_err(|e| BoardError::Internal(format!("key file corrupt: {}", e)))?;
            let seed: [u8; 32] = seed
                .try_into()
                .map_err(|_| BoardError::Internal("key file corrupt: bad seed length".to_string()))?;
            let signing_key = SigningKey::from_bytes(&seed);

            let derived_public = base64::engine::general_purpose::STANDARD
                .encode(signing_key.verifying_key().to_bytes());
            if derived_public != stored.public {
                return Err(BoardError::Internal(
                    "key file corrupt: public key mismatch".to_string(),
                ));
            }

            debug!("Actor signing key loaded");
            return Ok(Self { signing_key, key_id });
        }

        let signing_key = SigningKey::generate(&mut OsRng);
        let stored = StoredKey {
            secret: base64::engine::general_purpose::STANDARD.encode(signing_key.to_bytes()),
            public: base64::engine::general_purpose::STANDARD
                .encode(signing_key.verifying_key().to_bytes()),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(
            path,
            serde_json::to_string_pretty(&stored)
                .map_err(|e| BoardError::Internal(format!("key serialization failed: {}", e)))?,
        )?;
        info!("Actor signing key generated and persisted");

        Ok(Self { signing_key, key_id })
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Public key as base64, for the actor document's key block
    pub fn public_key_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.verifying_key().to_bytes())
    }

    /// Sign a message, returning the base64 signature
    pub fn sign(&self, message: &[u8]) -> String {
        let signature = self.signing_key.sign(message);
        base64::engine::general_purpose::STANDARD.encode(signature.to_bytes())
    }
}

/// Directory of counterpart public keys, cached by key id. Unknown keys
/// are resolved from the owning actor's document.
pub struct KeyDirectory {
    cache: DashMap<String, VerifyingKey>,
    client: reqwest::Client,
}

impl KeyDirectory {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            cache: DashMap::new(),
            client,
        }
    }

    /// Register a key directly (the local actor's own key, tests)
    pub fn insert(&self, key_id: &str, key: VerifyingKey) {
        self.cache.insert(key_id.to_string(), key);
    }

    pub fn cached(&self, key_id: &str) -> Option<VerifyingKey> {
        self.cache.get(key_id).map(|entry| *entry.value())
    }

    /// Resolve a key id, fetching the owning actor document on a cache
    /// miss. Every failure resolves to `None`.
    pub async fn resolve(&self, key_id: &str) -> Option<VerifyingKey> {
        if let Some(key) = self.cached(key_id) {
            return Some(key);
        }

        let actor_url = key_id.split('#').next().unwrap_or(key_id);
        let doc: serde_json::Value = self
            .client
            .get(actor_url)
            .header("Accept", "application/activity+json")
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()?;

        let encoded = doc
            .get("publicKey")
            .and_then(|block| block.get("publicKeyBase64"))
            .and_then(|v| v.as_str())?;
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        let key = VerifyingKey::from_bytes(&bytes).ok()?;

        self.cache.insert(key_id.to_string(), key);
        Some(key)
    }
}
