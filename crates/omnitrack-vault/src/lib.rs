//! Credential vault codec: authenticated encryption for tokens and session
//! blobs before they touch persistent storage.
//!
//! AES-256-GCM with a random 128-bit nonce per encryption and a 128-bit
//! authentication tag, packed into a versioned envelope with base64 binary
//! fields. Decryption rejects envelopes whose `version` or `algorithm` does
//! not match the current codec — no best-effort fallback paths.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use aes_gcm::Nonce;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// GCM with a 16-byte nonce (the envelope format predates the 12-byte
/// convention and stores a full 128-bit IV).
type Cipher = AesGcm<Aes256, U16>;

const ALGORITHM: &str = "aes-256-gcm";
const VERSION: u32 = 1;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault key must be {KEY_LEN} bytes ({} hex chars)", KEY_LEN * 2)]
    InvalidKey,

    #[error("unsupported envelope version {0} (expected {VERSION})")]
    UnsupportedVersion(u32),

    #[error("unsupported algorithm '{0}' (expected {ALGORITHM})")]
    UnsupportedAlgorithm(String),

    #[error("envelope field '{field}' is not valid base64")]
    Decode { field: &'static str },

    #[error("envelope iv/tag length is wrong")]
    MalformedEnvelope,

    #[error("encryption failed")]
    Encrypt,

    /// Wrong key or tampered ciphertext/tag. Deliberately carries no
    /// diagnostic detail.
    #[error("decryption failed")]
    Decrypt,
}

/// The at-rest envelope. All binary fields are base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEnvelope {
    pub ciphertext: String,
    pub iv: String,
    pub auth_tag: String,
    pub algorithm: String,
    pub version: u32,
}

/// The codec, holding one 256-bit key for the process lifetime.
pub struct CredentialVault {
    cipher: Cipher,
}

impl CredentialVault {
    /// Build from a raw 32-byte key.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidKey`] when the key is not exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, VaultError> {
        if key.len() != KEY_LEN {
            return Err(VaultError::InvalidKey);
        }
        let cipher = Cipher::new_from_slice(key).map_err(|_| VaultError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Build from the configured 64-hex-char key string.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidKey`] when the string is not 64 hex chars.
    pub fn from_hex_key(key_hex: &str) -> Result<Self, VaultError> {
        let key = hex::decode(key_hex).map_err(|_| VaultError::InvalidKey)?;
        Self::new(&key)
    }

    /// Encrypt `plaintext` into a fresh envelope with a random nonce.
    ///
    /// # Errors
    ///
    /// [`VaultError::Encrypt`] on cipher failure.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<CredentialEnvelope, VaultError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);

        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: b"",
                },
            )
            .map_err(|_| VaultError::Encrypt)?;
        // The aead crate appends the tag to the ciphertext; the envelope
        // stores them as separate fields.
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(CredentialEnvelope {
            ciphertext: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(nonce),
            auth_tag: STANDARD.encode(tag),
            algorithm: ALGORITHM.to_owned(),
            version: VERSION,
        })
    }

    /// Decrypt an envelope back to the original plaintext.
    ///
    /// # Errors
    ///
    /// - [`VaultError::UnsupportedVersion`] / [`VaultError::UnsupportedAlgorithm`]
    ///   when the envelope was written by a different codec.
    /// - [`VaultError::Decode`] / [`VaultError::MalformedEnvelope`] on
    ///   structural damage.
    /// - [`VaultError::Decrypt`] on wrong key or tampering.
    pub fn decrypt(&self, envelope: &CredentialEnvelope) -> Result<Vec<u8>, VaultError> {
        if envelope.version != VERSION {
            return Err(VaultError::UnsupportedVersion(envelope.version));
        }
        if envelope.algorithm != ALGORITHM {
            return Err(VaultError::UnsupportedAlgorithm(envelope.algorithm.clone()));
        }

        let ciphertext = STANDARD
            .decode(&envelope.ciphertext)
            .map_err(|_| VaultError::Decode { field: "ciphertext" })?;
        let iv = STANDARD
            .decode(&envelope.iv)
            .map_err(|_| VaultError::Decode { field: "iv" })?;
        let tag = STANDARD
            .decode(&envelope.auth_tag)
            .map_err(|_| VaultError::Decode { field: "auth_tag" })?;
        if iv.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(VaultError::MalformedEnvelope);
        }

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);
        self.cipher
            .decrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &sealed,
                    aad: b"",
                },
            )
            .map_err(|_| VaultError::Decrypt)
    }

    /// Encrypt any serializable credential value as its JSON bytes.
    ///
    /// # Errors
    ///
    /// [`VaultError::Encrypt`] on serialization or cipher failure.
    pub fn encrypt_json<T: Serialize>(&self, value: &T) -> Result<CredentialEnvelope, VaultError> {
        let bytes = serde_json::to_vec(value).map_err(|_| VaultError::Encrypt)?;
        self.encrypt(&bytes)
    }

    /// Decrypt an envelope and deserialize the JSON plaintext.
    ///
    /// # Errors
    ///
    /// As [`CredentialVault::decrypt`], plus [`VaultError::Decrypt`] when
    /// the plaintext is not valid JSON for `T`.
    pub fn decrypt_json<T: serde::de::DeserializeOwned>(
        &self,
        envelope: &CredentialEnvelope,
    ) -> Result<T, VaultError> {
        let bytes = self.decrypt(envelope)?;
        serde_json::from_slice(&bytes).map_err(|_| VaultError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> CredentialVault {
        CredentialVault::from_hex_key(
            "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
        )
        .unwrap()
    }

    #[test]
    fn round_trip_recovers_plaintext() {
        let vault = vault();
        let envelope = vault.encrypt(b"access-token-abc123").unwrap();
        assert_eq!(envelope.algorithm, "aes-256-gcm");
        assert_eq!(envelope.version, 1);
        let plaintext = vault.decrypt(&envelope).unwrap();
        assert_eq!(plaintext, b"access-token-abc123");
    }

    #[test]
    fn nonces_are_unique_per_encryption() {
        let vault = vault();
        let a = vault.encrypt(b"same").unwrap();
        let b = vault.encrypt(b"same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let vault = vault();
        let mut envelope = vault.encrypt(b"secret").unwrap();
        let mut raw = STANDARD.decode(&envelope.ciphertext).unwrap();
        raw[0] ^= 0x01;
        envelope.ciphertext = STANDARD.encode(raw);
        assert!(matches!(vault.decrypt(&envelope), Err(VaultError::Decrypt)));
    }

    #[test]
    fn tampered_tag_fails() {
        let vault = vault();
        let mut envelope = vault.encrypt(b"secret").unwrap();
        let mut tag = STANDARD.decode(&envelope.auth_tag).unwrap();
        tag[0] ^= 0x01;
        envelope.auth_tag = STANDARD.encode(tag);
        assert!(matches!(vault.decrypt(&envelope), Err(VaultError::Decrypt)));
    }

    #[test]
    fn tampered_iv_fails() {
        let vault = vault();
        let mut envelope = vault.encrypt(b"secret").unwrap();
        let mut iv = STANDARD.decode(&envelope.iv).unwrap();
        iv[3] ^= 0xff;
        envelope.iv = STANDARD.encode(iv);
        assert!(matches!(vault.decrypt(&envelope), Err(VaultError::Decrypt)));
    }

    #[test]
    fn wrong_key_fails() {
        let envelope = vault().encrypt(b"secret").unwrap();
        let other = CredentialVault::from_hex_key(
            "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        )
        .unwrap();
        assert!(matches!(other.decrypt(&envelope), Err(VaultError::Decrypt)));
    }

    #[test]
    fn foreign_version_and_algorithm_are_rejected() {
        let vault = vault();
        let mut envelope = vault.encrypt(b"secret").unwrap();
        envelope.version = 2;
        assert!(matches!(
            vault.decrypt(&envelope),
            Err(VaultError::UnsupportedVersion(2))
        ));

        let mut envelope = vault.encrypt(b"secret").unwrap();
        envelope.algorithm = "chacha20-poly1305".to_owned();
        assert!(matches!(
            vault.decrypt(&envelope),
            Err(VaultError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(matches!(
            CredentialVault::from_hex_key("deadbeef"),
            Err(VaultError::InvalidKey)
        ));
        assert!(matches!(
            CredentialVault::new(&[0u8; 16]),
            Err(VaultError::InvalidKey)
        ));
    }

    #[test]
    fn json_round_trip() {
        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Token {
            access: String,
            refresh: Option<String>,
        }
        let vault = vault();
        let token = Token {
            access: "a1".to_owned(),
            refresh: Some("r1".to_owned()),
        };
        let envelope = vault.encrypt_json(&token).unwrap();
        let back: Token = vault.decrypt_json(&envelope).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn envelope_serializes_with_expected_fields() {
        let envelope = vault().encrypt(b"x").unwrap();
        let json = serde_json::to_value(&envelope).unwrap();
        for field in ["ciphertext", "iv", "auth_tag", "algorithm", "version"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
