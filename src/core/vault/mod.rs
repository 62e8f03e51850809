use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::Result;
use base64::Engine;
use hmac::Mac;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;

type HmacSha256 = hmac::Hmac<Sha256>;

const KEY_DERIVATION_LABEL: &[u8] = b"fhirbuilders-credentials-v1";
const NONCE_LEN: usize = 12;

/// Encrypts channel credentials at rest.
///
/// Values are sealed as base64(nonce || ciphertext) with AES-256-GCM under a
/// key derived from the configured secret via HMAC-SHA256.
#[derive(Clone)]
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

fn derive_key(secret: &str) -> Result<[u8; 32]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(KEY_DERIVATION_LABEL)
        .map_err(|e| anyhow::anyhow!("Key derivation failed: {}", e))?;
    mac.update(secret.as_bytes());
    let bytes = mac.finalize().into_bytes();

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

impl CredentialVault {
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(anyhow::anyhow!("Credential secret must not be empty"));
        }
        let key = derive_key(secret)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow::anyhow!("Invalid AES key: {}", e))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("Base64 decode failed: {}", e))?;

        if combined.len() <= NONCE_LEN {
            return Err(anyhow::anyhow!("Encrypted value too short"));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))?;

        String::from_utf8(plaintext).map_err(|e| anyhow::anyhow!("UTF-8 decode failed: {}", e))
    }

    pub fn seal_json<T: Serialize>(&self, value: &T) -> Result<String> {
        self.encrypt(&serde_json::to_string(value)?)
    }

    pub fn open_json<T: DeserializeOwned>(&self, sealed: &str) -> Result<T> {
        let plaintext = self.decrypt(sealed)?;
        Ok(serde_json::from_str(&plaintext)?)
    }
}
