//! AES-256-GCM encryption for API keys at rest.
//!
//! The 32-byte master key comes from a key file in the data directory
//! (base64, created on first run with owner-only permissions) or is derived
//! from a passphrase with Argon2id.
//!
//! Sealed format: `nonce (12 bytes) || ciphertext+tag`. Error values never
//! carry plaintext, ciphertext or key material.

use std::io::ErrorKind;
use std::path::Path;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use argon2::Argon2;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// File name of the master key inside the data directory.
pub const KEY_FILE_NAME: &str = "vault.key";

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const PASSPHRASE_SALT: &[u8] = b"parley-vault-v1";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("sealed value is truncated")]
    Truncated,

    #[error("key derivation failed")]
    KeyDerivationFailed,

    #[error("vault key file {path}: {reason}")]
    KeyFile { path: String, reason: String },
}

/// Symmetric cipher for vault values.
pub struct VaultCrypto {
    cipher: Aes256Gcm,
}

impl VaultCrypto {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    /// Derive the master key from a passphrase (Argon2id, default OWASP parameters, fixed salt).
    pub fn from_passphrase(passphrase: &str) -> Result<Self, VaultError> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), PASSPHRASE_SALT, &mut key)
            .map_err(|_| VaultError::KeyDerivationFailed)?;
        Ok(Self::new(&key))
    }

    /// Load the master key from `path`, creating a fresh random key if the file doesn't exist.
    pub fn from_key_file(path: &Path) -> Result<Self, VaultError> {
        let key_file_error = |reason: String| VaultError::KeyFile {
            path: path.display().to_string(),
            reason,
        };

        let key = match std::fs::read_to_string(path) {
            Ok(encoded) => STANDARD
                .decode(encoded.trim())
                .ok()
                .and_then(|bytes| <[u8; KEY_LEN]>::try_from(bytes).ok())
                .ok_or_else(|| key_file_error("not a base64 encoded 32-byte key".to_string()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let mut key = [0u8; KEY_LEN];
                OsRng.fill_bytes(&mut key);
                write_owner_only(path, &STANDARD.encode(key))
                    .map_err(|e| key_file_error(e.to_string()))?;
                tracing::info!(path = %path.display(), "Created vault key");
                key
            }
            Err(e) => return Err(key_file_error(e.to_string())),
        };

        Ok(Self::new(&key))
    }

    /// Encrypt with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| VaultError::EncryptionFailed)?;

        let mut out = nonce.to_vec();
        out.extend(sealed);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, VaultError> {
        if data.len() <= NONCE_LEN {
            return Err(VaultError::Truncated);
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| VaultError::DecryptionFailed)
    }
}

fn write_owner_only(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crypto(seed: u8) -> VaultCrypto {
        VaultCrypto::new(&[seed; KEY_LEN])
    }

    #[test]
    fn test_sealed_value_opens_with_same_key_only() {
        let sealed = crypto(1).encrypt(b"AIzaSy-gemini-key").unwrap();

        assert!(!sealed.windows(6).any(|w| w == b"AIzaSy"));
        assert_eq!(crypto(1).decrypt(&sealed).unwrap(), b"AIzaSy-gemini-key");
        assert!(matches!(crypto(2).decrypt(&sealed), Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn test_nonce_differs_per_call() {
        let vault = crypto(7);
        assert_ne!(vault.encrypt(b"same").unwrap(), vault.encrypt(b"same").unwrap());
    }

    #[test]
    fn test_truncated_input() {
        assert!(matches!(crypto(1).decrypt(&[0u8; NONCE_LEN]), Err(VaultError::Truncated)));
    }

    #[test]
    fn test_passphrase_key_is_stable() {
        let sealed = VaultCrypto::from_passphrase("correct horse")
            .unwrap()
            .encrypt(b"data")
            .unwrap();

        let same = VaultCrypto::from_passphrase("correct horse").unwrap();
        let other = VaultCrypto::from_passphrase("battery staple").unwrap();
        assert_eq!(same.decrypt(&sealed).unwrap(), b"data");
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_key_file_created_once_then_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(KEY_FILE_NAME);

        let sealed = VaultCrypto::from_key_file(&path)
            .unwrap()
            .encrypt(b"persisted")
            .unwrap();
        let encoded = std::fs::read_to_string(&path).unwrap();
        assert_eq!(STANDARD.decode(encoded.trim()).unwrap().len(), KEY_LEN);

        let reopened = VaultCrypto::from_key_file(&path).unwrap();
        assert_eq!(reopened.decrypt(&sealed).unwrap(), b"persisted");
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(KEY_FILE_NAME);
        VaultCrypto::from_key_file(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_bad_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(KEY_FILE_NAME);

        for contents in ["%%% not base64 %%%", "c2hvcnQ="] {
            std::fs::write(&path, contents).unwrap();
            match VaultCrypto::from_key_file(&path) {
                Err(VaultError::KeyFile { reason, .. }) => assert!(reason.contains("32-byte")),
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => panic!("bad key file accepted"),
            }
        }
    }
}
