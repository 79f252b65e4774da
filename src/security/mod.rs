//! Security module
//!
//! Credential storage for the grader API key and the Telegram bot token.

pub mod keyring;

pub use keyring::StoredSecret;

use anyhow::Result;

/// Store the grader API key
pub fn set_api_key(key: &str) -> Result<()> {
    keyring::set_secret(StoredSecret::GraderApiKey, key)
}

/// Grader API key from environment, keyring or file
pub fn get_api_key() -> Result<String> {
    keyring::get_secret(StoredSecret::GraderApiKey)
}

/// Delete the grader API key
pub fn delete_api_key() -> Result<()> {
    keyring::delete_secret(StoredSecret::GraderApiKey)
}

pub fn has_api_key() -> bool {
    keyring::has_secret(StoredSecret::GraderApiKey)
}

/// Store the Telegram bot token
pub fn set_telegram_token(token: &str) -> Result<()> {
    keyring::set_secret(StoredSecret::TelegramToken, token)
}

/// Telegram bot token from environment, keyring or file
pub fn get_telegram_token() -> Result<String> {
    keyring::get_secret(StoredSecret::TelegramToken)
}
