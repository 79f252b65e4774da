//! Keyring integration for the grader API key and bot token
//! Falls back to file storage if keyring is unavailable

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const SERVICE_NAME: &str = "lingua-tutor";

/// Secrets the tutor needs at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredSecret {
    GraderApiKey,
    TelegramToken,
}

impl StoredSecret {
    fn username(self) -> &'static str {
        match self {
            StoredSecret::GraderApiKey => "grader-api-key",
            StoredSecret::TelegramToken => "telegram-bot-token",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            StoredSecret::GraderApiKey => "grader_api_key.txt",
            StoredSecret::TelegramToken => "telegram_token.txt",
        }
    }

    /// Environment variable that overrides the stored value
    pub fn env_var(self) -> &'static str {
        match self {
            StoredSecret::GraderApiKey => "LINGUA_GRADER_API_KEY",
            StoredSecret::TelegramToken => "TELEGRAM_BOT_TOKEN",
        }
    }

    fn set_hint(self) -> &'static str {
        match self {
            StoredSecret::GraderApiKey => "lingua-tutor config --set-api-key YOUR_KEY",
            StoredSecret::TelegramToken => "lingua-tutor config --set-telegram-token YOUR_TOKEN",
        }
    }
}

impl std::fmt::Display for StoredSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoredSecret::GraderApiKey => write!(f, "grader API key"),
            StoredSecret::TelegramToken => write!(f, "Telegram bot token"),
        }
    }
}

fn secret_file_path(secret: StoredSecret) -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "lingua-tutor", "lingua-tutor")
        .context("Failed to get project directories")?;
    let dir = base.config_dir();
    fs::create_dir_all(dir).context("Failed to create config directory")?;
    Ok(dir.join(secret.file_name()))
}

fn read_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Store a secret - tries keyring first, falls back to file
pub fn set_secret(secret: StoredSecret, value: &str) -> Result<()> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, secret.username()) {
        if entry.set_password(value).is_ok() {
            return Ok(());
        }
    }

    let path = secret_file_path(secret)?;
    fs::write(&path, value).with_context(|| format!("Failed to write {} file", secret))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .context("Failed to set file permissions")?;
    }

    println!("Note: Using file-based storage (keyring unavailable)");
    Ok(())
}

/// Read a secret - environment, then keyring, then file
pub fn get_secret(secret: StoredSecret) -> Result<String> {
    if let Some(value) = read_env(secret.env_var()) {
        return Ok(value);
    }

    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, secret.username()) {
        if let Ok(value) = entry.get_password() {
            return Ok(value);
        }
    }

    let path = secret_file_path(secret)?;
    let value = fs::read_to_string(&path).with_context(|| {
        format!(
            "No {} found. Set {} or run '{}' first.",
            secret,
            secret.env_var(),
            secret.set_hint()
        )
    })?;
    Ok(value.trim().to_string())
}

/// Delete a secret from both keyring and file
pub fn delete_secret(secret: StoredSecret) -> Result<()> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, secret.username()) {
        let _ = entry.delete_credential();
    }

    let path = secret_file_path(secret)?;
    if path.exists() {
        fs::remove_file(&path).with_context(|| format!("Failed to delete {} file", secret))?;
    }

    Ok(())
}

/// Check if a secret is available from any source
pub fn has_secret(secret: StoredSecret) -> bool {
    if read_env(secret.env_var()).is_some() {
        return true;
    }

    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, secret.username()) {
        if entry.get_password().is_ok() {
            return true;
        }
    }

    secret_file_path(secret).map(|p| p.exists()).unwrap_or(false)
}
