//! Settings store: per-user LLM provider settings and their resolution into an
//! `LlmConfig` for the client factory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::credentials::{CredentialCipher, CredentialError};
use crate::llm_client::LlmConfig;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSettings {
    pub user_id: Uuid,
    pub llm_endpoint: Option<String>,
    pub llm_model_name: Option<String>,
    #[serde(skip_serializing)]
    pub encrypted_api_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub async fn get_user_settings(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserSettings>, sqlx::Error> {
    sqlx::query_as::<_, UserSettings>("SELECT * FROM user_settings WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Builds the LLM configuration for a user. Missing settings give an empty
/// config (ambient defaults apply); blank strings count as absent.
pub fn resolve_llm_config(
    settings: Option<&UserSettings>,
    cipher: &CredentialCipher,
) -> Result<LlmConfig, CredentialError> {
    let Some(settings) = settings else {
        return Ok(LlmConfig::default());
    };

    let api_key = match non_blank(settings.encrypted_api_key.as_deref()) {
        Some(token) => Some(cipher.decrypt(token)?),
        None => None,
    };

    Ok(LlmConfig {
        endpoint: non_blank(settings.llm_endpoint.as_deref()).map(str::to_string),
        api_key: api_key.filter(|k| !k.trim().is_empty()),
        model_name: non_blank(settings.llm_model_name.as_deref()).map(str::to_string),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) fn test_settings(
    endpoint: Option<&str>,
    model_name: Option<&str>,
    encrypted_api_key: Option<String>,
) -> UserSettings {
    UserSettings {
        user_id: Uuid::new_v4(),
        llm_endpoint: endpoint.map(str::to_string),
        llm_model_name: model_name.map(str::to_string),
        encrypted_api_key,
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> CredentialCipher {
        CredentialCipher::new(&fernet::Fernet::generate_key()).unwrap()
    }

    #[test]
    fn test_missing_settings_resolve_to_defaults() {
        let config = resolve_llm_config(None, &cipher()).unwrap();
        assert_eq!(config, LlmConfig::default());
    }

    #[test]
    fn test_stored_key_is_decrypted() {
        let cipher = cipher();
        let settings = test_settings(
            Some("http://localhost:11434/v1"),
            Some("llama3"),
            Some(cipher.encrypt("sk-user")),
        );
        let config = resolve_llm_config(Some(&settings), &cipher).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(config.model_name.as_deref(), Some("llama3"));
        assert_eq!(config.api_key.as_deref(), Some("sk-user"));
    }

    #[test]
    fn test_blank_fields_count_as_absent() {
        let settings = test_settings(Some("  "), Some(""), Some(" ".to_string()));
        let config = resolve_llm_config(Some(&settings), &cipher()).unwrap();
        assert_eq!(config, LlmConfig::default());
    }

    #[test]
    fn test_corrupt_key_is_invalid_token() {
        let settings = test_settings(None, None, Some("corrupted".to_string()));
        assert!(matches!(
            resolve_llm_config(Some(&settings), &cipher()),
            Err(CredentialError::InvalidToken)
        ));
    }
}
