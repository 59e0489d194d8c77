//! Symmetric encryption for integration tokens stored in
//! `Workspace.settings` (SPEC_FULL §11): OAuth/calendar access tokens are
//! never written to the database in plaintext.

use crate::error::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

fn derive_key(key_material: &SecretString) -> Key<Aes256Gcm> {
    let mut hasher = Sha256::new();
    hasher.update(key_material.expose_secret().as_bytes());
    Key::<Aes256Gcm>::clone_from_slice(&hasher.finalize())
}

/// Encrypts `plaintext`, returning a base64 blob of `nonce || ciphertext`.
pub fn encrypt_secret(key_material: &SecretString, plaintext: &str) -> Result<String> {
    let cipher = Aes256Gcm::new(&derive_key(key_material));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| Error::Internal("token encryption failed".to_string()))?;

    let mut blob = nonce_bytes.to_vec();
    blob.extend(ciphertext);
    Ok(STANDARD.encode(blob))
}

/// Reverses `encrypt_secret`, returning the plaintext wrapped in a
/// `SecretString` so it never gets logged by accident downstream.
pub fn decrypt_secret(key_material: &SecretString, encoded: &str) -> Result<SecretString> {
    let blob = STANDARD
        .decode(encoded)
        .map_err(|_| Error::Internal("malformed encrypted token encoding".to_string()))?;
    if blob.len() < NONCE_LEN {
        return Err(Error::Internal("encrypted token too short".to_string()));
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(&derive_key(key_material));
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| Error::Internal("token decryption failed".to_string()))?;

    String::from_utf8(plaintext)
        .map(SecretString::from)
        .map_err(|_| Error::Internal("decrypted token was not valid utf-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_secret() {
        let key = SecretString::from("a".repeat(32));
        let encrypted = encrypt_secret(&key, "oauth-access-token").unwrap();
        let decrypted = decrypt_secret(&key, &encrypted).unwrap();
        assert_eq!(decrypted.expose_secret(), "oauth-access-token");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let key = SecretString::from("a".repeat(32));
        let other = SecretString::from("b".repeat(32));
        let encrypted = encrypt_secret(&key, "secret").unwrap();
        assert!(decrypt_secret(&other, &encrypted).is_err());
    }
}
