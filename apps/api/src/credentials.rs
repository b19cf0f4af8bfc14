//! Credential store for user-supplied LLM API keys. Keys are kept at rest as
//! Fernet tokens under the service-wide `ENCRYPTION_KEY`.

use fernet::Fernet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("encryption key is not a valid url-safe base64 Fernet key")]
    InvalidKey,

    #[error("stored credential could not be decrypted")]
    InvalidToken,
}

pub struct CredentialCipher {
    fernet: Fernet,
}

impl CredentialCipher {
    pub fn new(key: &str) -> Result<Self, CredentialError> {
        let fernet = Fernet::new(key.trim()).ok_or(CredentialError::InvalidKey)?;
        Ok(Self { fernet })
    }

    #[allow(dead_code)]
    pub fn encrypt(&self, plaintext: &str) -> String {
        self.fernet.encrypt(plaintext.as_bytes())
    }

    /// Fails with `InvalidToken` for corrupt, foreign-key or non-UTF-8 ciphertext.
    pub fn decrypt(&self, token: &str) -> Result<String, CredentialError> {
        let bytes = self
            .fernet
            .decrypt(token.trim())
            .map_err(|_| CredentialError::InvalidToken)?;
        String::from_utf8(bytes).map_err(|_| CredentialError::InvalidToken)
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCipher(..)")
    }
}
