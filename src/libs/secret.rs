//! Credential codec for API tokens kept at rest.
//!
//! Tokens are encrypted with AES-256-CBC (PKCS#7 padding) and stored as
//! base64 text. Key material comes either from a dotenv-style key file or
//! from the defaults embedded at build time by `build.rs`:
//!
//! ```text
//! ENCRYPTION_KEY=<exactly 32 bytes>
//! ENCRYPTION_IV=<exactly 16 bytes>
//! ```
//!
//! A fixed marker is prepended to every plaintext so that decrypting with the
//! wrong key material is reported as [`CipherError::Mismatch`] instead of
//! returning garbage.

use aes::Aes256;
use base64::prelude::*;
use block_modes::block_padding::Pkcs7;
use block_modes::{BlockMode, Cbc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Include generated metadata with encryption keys
include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

type Aes256Cbc = Cbc<Aes256, Pkcs7>;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
const KEY_VAR: &str = "ENCRYPTION_KEY";
const IV_VAR: &str = "ENCRYPTION_IV";
const MARKER: &[u8] = b"doover:v1:";

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("key material file {0} not found")]
    KeyMaterialMissing(PathBuf),
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
    #[error("ciphertext does not match the configured key material")]
    Mismatch,
    #[error("ciphertext is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("failed to write key material: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct Cipher {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

impl Cipher {
    /// Cipher keyed with the material embedded at build time.
    pub fn embedded() -> Self {
        Self {
            key: APP_METADATA_ENCRYPTION_KEY.to_vec(),
            iv: APP_METADATA_ENCRYPTION_IV.to_vec(),
        }
    }

    pub fn from_parts(key: &[u8], iv: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKeyMaterial(format!("{} must be exactly {} bytes, got {}", KEY_VAR, KEY_LEN, key.len())));
        }
        if iv.len() != IV_LEN {
            return Err(CipherError::InvalidKeyMaterial(format!("{} must be exactly {} bytes, got {}", IV_VAR, IV_LEN, iv.len())));
        }
        Ok(Self {
            key: key.to_vec(),
            iv: iv.to_vec(),
        })
    }

    /// Loads key material from a dotenv-style file.
    pub fn from_key_file(path: &Path) -> Result<Self, CipherError> {
        if !path.exists() {
            return Err(CipherError::KeyMaterialMissing(path.to_path_buf()));
        }
        let entries = dotenv::from_path_iter(path).map_err(|e| CipherError::InvalidKeyMaterial(e.to_string()))?;

        let (mut key, mut iv) = (None, None);
        for entry in entries {
            let (name, value) = entry.map_err(|e| CipherError::InvalidKeyMaterial(e.to_string()))?;
            match name.as_str() {
                KEY_VAR => key = Some(value),
                IV_VAR => iv = Some(value),
                _ => {}
            }
        }

        match (key, iv) {
            (Some(key), Some(iv)) => Self::from_parts(key.as_bytes(), iv.as_bytes()),
            _ => Err(CipherError::InvalidKeyMaterial(format!("{} must define {} and {}", path.display(), KEY_VAR, IV_VAR))),
        }
    }

    /// Writes a key file readable by [`Cipher::from_key_file`].
    pub fn write_key_file(path: &Path, key: &str, iv: &str) -> Result<(), CipherError> {
        Self::from_parts(key.as_bytes(), iv.as_bytes())?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        writeln!(file, "{}={}", KEY_VAR, key)?;
        writeln!(file, "{}={}", IV_VAR, iv)?;
        Ok(())
    }

    /// Encrypts `plaintext` and returns the base64 ciphertext bytes.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = self.block_mode()?;
        let mut marked = Vec::with_capacity(MARKER.len() + plaintext.len());
        marked.extend_from_slice(MARKER);
        marked.extend_from_slice(plaintext);

        let ciphertext = cipher.encrypt_vec(&marked);
        Ok(BASE64_STANDARD.encode(ciphertext).into_bytes())
    }

    /// Reverses [`Cipher::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let raw = BASE64_STANDARD.decode(ciphertext)?;
        let cipher = self.block_mode()?;
        let decrypted = cipher.decrypt_vec(&raw).map_err(|_| CipherError::Mismatch)?;

        match decrypted.strip_prefix(MARKER) {
            Some(plaintext) => Ok(plaintext.to_vec()),
            None => Err(CipherError::Mismatch),
        }
    }

    pub fn encrypt_token(&self, token: &str) -> Result<Vec<u8>, CipherError> {
        self.encrypt(token.as_bytes())
    }

    pub fn decrypt_token(&self, ciphertext: &[u8]) -> Result<String, CipherError> {
        String::from_utf8(self.decrypt(ciphertext)?).map_err(|_| CipherError::Mismatch)
    }

    fn block_mode(&self) -> Result<Aes256Cbc, CipherError> {
        Aes256Cbc::new_from_slices(&self.key, &self.iv).map_err(|e| CipherError::InvalidKeyMaterial(e.to_string()))
    }
}
