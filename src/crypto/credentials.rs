//! Credential envelope cipher shared with the backend tier.
//!
//! Wire format of every encrypted field: `base64(IV(16) || AES-256-CBC(ciphertext))`,
//! standard alphabet with padding.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::crypto::aes::{self, SecureKey, IV_SIZE};
use crate::error::{AppError, Result};

/// Encrypts and decrypts AWS secret material with the shared key.
pub struct CipherService {
    key: SecureKey,
}

/// Encrypted AWS credentials as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEnvelope {
    pub encrypted_aws_access_key: String,
    pub encrypted_aws_secret_key: String,
    /// Absent (not an empty string) when no session token was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_aws_session_token: Option<String>,
}

/// Plaintext AWS credentials recovered from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl CipherService {
    /// Builds the service from the configured secret.
    ///
    /// # Returns
    ///
    /// `AppError::Configuration` when no secret is configured.
    pub fn from_secret(secret: Option<&str>) -> Result<Self> {
        match secret {
            Some(s) if !s.is_empty() => Ok(Self {
                key: SecureKey::from_secret(s),
            }),
            _ => Err(AppError::Configuration(
                "No encryption key configured (set CLOUDLENS_ENCRYPTION_KEY)".to_string(),
            )),
        }
    }

    /// Encrypts `plaintext`. Empty input yields an empty string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let (iv, ciphertext) = aes::encrypt(&self.key, plaintext.as_bytes());

        let mut combined = Vec::with_capacity(IV_SIZE + ciphertext.len());
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(combined))
    }

    /// Decrypts a value produced by [`CipherService::encrypt`]. Empty input yields
    /// an empty string.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        if encoded.is_empty() {
            return Ok(String::new());
        }

        let combined = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Decryption(format!("Invalid base64: {}", e)))?;

        if combined.len() < IV_SIZE {
            return Err(AppError::Decryption(format!(
                "Envelope is {} bytes, shorter than the IV",
                combined.len()
            )));
        }

        let (iv_bytes, body) = combined.split_at(IV_SIZE);
        let iv: [u8; IV_SIZE] = iv_bytes
            .try_into()
            .map_err(|_| AppError::Decryption("Invalid IV size".to_string()))?;

        let plaintext = aes::decrypt(&self.key, &iv, body)?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::Decryption("Plaintext is not valid UTF-8".to_string()))
    }

    /// Encrypts each supplied credential independently.
    pub fn encrypt_credential_bundle(
        &self,
        access_key: &str,
        secret_key: &str,
        session_token: Option<&str>,
    ) -> Result<CredentialEnvelope> {
        Ok(CredentialEnvelope {
            encrypted_aws_access_key: self.encrypt(access_key)?,
            encrypted_aws_secret_key: self.encrypt(secret_key)?,
            encrypted_aws_session_token: session_token.map(|t| self.encrypt(t)).transpose()?,
        })
    }

    /// Inverse of [`CipherService::encrypt_credential_bundle`].
    pub fn decrypt_credential_bundle(&self, envelope: &CredentialEnvelope) -> Result<AwsCredentials> {
        Ok(AwsCredentials {
            access_key: self.decrypt(&envelope.encrypted_aws_access_key)?,
            secret_key: self.decrypt(&envelope.encrypted_aws_secret_key)?,
            session_token: envelope
                .encrypted_aws_session_token
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| self.decrypt(t))
                .transpose()?,
        })
    }
}
