//! Telegram front-end
//!
//! Long-polls the Bot API with `getUpdates` and renders presentations as
//! messages with inline keyboards. Button presses arrive as callback
//! queries carrying the option key.
//!
//! # Setup
//!
//! 1. Create a bot via @BotFather
//! 2. Store the token: `lingua-tutor config --set-telegram-token`
//!    (or set TELEGRAM_BOT_TOKEN)
//! 3. Run `lingua-tutor telegram`

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::TelegramSettings;
use crate::messaging::{ButtonOption, FrontEnd, LearnerIntent, Presentation};
use crate::session::keys::{Choice, MenuAction};
use crate::session::SessionCoordinator;
use crate::types::LearnerId;

/// Telegram API base URL
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Pause after a failed poll before trying again
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram connection settings
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// API base URL (for self-hosted bot API servers)
    pub api_base: String,
    pub poll_timeout_secs: u32,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
            poll_timeout_secs: 30,
        }
    }

    /// Token from environment or keyring, then the config file
    pub fn from_settings(settings: &TelegramSettings) -> Result<Self> {
        let bot_token = crate::security::get_telegram_token()
            .ok()
            .or_else(|| settings.bot_token.clone())
            .filter(|t| !t.trim().is_empty())
            .context(
                "Telegram bot token not configured. Set TELEGRAM_BOT_TOKEN or run: lingua-tutor config --set-telegram-token",
            )?;

        Ok(Self {
            poll_timeout_secs: settings.poll_timeout_secs,
            ..Self::new(bot_token)
        })
    }

    /// Check if the token looks like a bot token
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && self.bot_token.contains(':')
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i32>,
}

impl<T> TelegramResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if self.ok {
            self.result.with_context(|| format!("No result in {} response", method))
        } else {
            let message = self.description.unwrap_or_else(|| "Unknown error".to_string());
            bail!("Telegram API error in {}: {} (code: {:?})", method, message, self.error_code)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    pub data: Option<String>,
}

/// Incoming event
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<serde_json::Value>,
}

/// One button per row; labels are often full sentences
pub fn inline_keyboard(options: &[ButtonOption]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = options
        .iter()
        .map(|o| serde_json::json!([{ "text": o.label, "callback_data": o.key }]))
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

/// Translate an update into a learner intent.
///
/// Returns the callback query id alongside, which must be answered so the
/// client stops showing a spinner. Bots and non-text messages are ignored.
pub fn intent_from_update(update: &TelegramUpdate) -> Option<(LearnerIntent, Option<String>)> {
    if let Some(callback) = &update.callback_query {
        if callback.from.is_bot {
            return None;
        }
        let key = callback.data.clone()?;
        let intent = LearnerIntent::button(callback.from.id, callback.from.first_name.clone(), key);
        return Some((intent, Some(callback.id.clone())));
    }

    let message = update.message.as_ref()?;
    let from = message.from.as_ref()?;
    if from.is_bot {
        return None;
    }
    let text = message.text.as_deref()?.trim();
    let name = from.first_name.clone();

    // Commands may carry the bot name, e.g. /menu@lingua_bot
    let command = text
        .strip_prefix('/')
        .map(|c| c.split(['@', ' ']).next().unwrap_or_default().to_lowercase());

    let intent = match command.as_deref() {
        Some("start") | Some("menu") => LearnerIntent::exit(from.id, name),
        Some("help") => LearnerIntent::button(from.id, name, Choice::Menu(MenuAction::Help).key()),
        Some("progress") => LearnerIntent::button(from.id, name, Choice::Menu(MenuAction::Progress).key()),
        _ => LearnerIntent::text(from.id, name, text),
    };
    Some((intent, None))
}

/// Telegram bot client
#[derive(Debug, Clone)]
pub struct TelegramBot {
    config: TelegramConfig,
    http_client: reqwest::Client,
}

impl TelegramBot {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        // Long polls hold the connection for poll_timeout_secs
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs as u64 + 10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, http_client })
    }

    /// Test the bot token and get bot info
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response: TelegramResponse<TelegramUser> = self
            .http_client
            .get(self.config.api_url("getMe"))
            .send()
            .await
            .context("Failed to connect to Telegram API")?
            .json()
            .await
            .context("Failed to parse Telegram response")?;
        response.into_result("getMe")
    }

    /// Send one presentation, with an inline keyboard when it has options
    pub async fn send_presentation(&self, chat_id: i64, presentation: &Presentation) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text: &presentation.text,
            reply_markup: presentation.options.as_deref().map(inline_keyboard),
        };

        let response: TelegramResponse<TelegramMessage> = self
            .http_client
            .post(self.config.api_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .context("Failed to send Telegram message")?
            .json()
            .await
            .context("Failed to parse Telegram response")?;
        response.into_result("sendMessage")?;
        debug!("Telegram message sent to {}", chat_id);
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        let response: TelegramResponse<bool> = self
            .http_client
            .post(self.config.api_url("answerCallbackQuery"))
            .json(&serde_json::json!({ "callback_query_id": callback_id }))
            .send()
            .await
            .context("Failed to answer callback query")?
            .json()
            .await
            .context("Failed to parse Telegram response")?;
        response.into_result("answerCallbackQuery").map(|_| ())
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<TelegramUpdate>> {
        #[derive(Serialize)]
        struct GetUpdatesRequest {
            #[serde(skip_serializing_if = "Option::is_none")]
            offset: Option<i64>,
            timeout: u32,
            allowed_updates: [&'static str; 2],
        }

        let request = GetUpdatesRequest {
            offset,
            timeout: self.config.poll_timeout_secs,
            allowed_updates: ["message", "callback_query"],
        };

        let response: TelegramResponse<Vec<TelegramUpdate>> = self
            .http_client
            .post(self.config.api_url("getUpdates"))
            .json(&request)
            .send()
            .await
            .context("Failed to get Telegram updates")?
            .json()
            .await
            .context("Failed to parse Telegram response")?;
        response.into_result("getUpdates")
    }

    async fn process(&self, coordinator: &SessionCoordinator, update: &TelegramUpdate) {
        let Some((intent, callback_id)) = intent_from_update(update) else {
            debug!("Ignoring Telegram update {}", update.update_id);
            return;
        };
        if let Some(id) = callback_id {
            if let Err(e) = self.answer_callback(&id).await {
                warn!("{:#}", e);
            }
        }

        let learner_id = intent.learner_id;
        let presentations = coordinator.handle(intent).await;
        if let Err(e) = self.deliver(learner_id, &presentations).await {
            error!("Failed to deliver to learner {}: {:#}", learner_id, e);
        }
    }

    /// Poll and dispatch until Ctrl+C
    pub async fn run(&self, coordinator: Arc<SessionCoordinator>) -> Result<()> {
        let me = self.get_me().await.context("Telegram token rejected")?;
        info!("Telegram bot @{} started", me.username.as_deref().unwrap_or(&me.first_name));
        println!("Telegram bot running. Press Ctrl+C to stop.");

        let mut offset: Option<i64> = None;
        loop {
            let updates = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Telegram bot stopping");
                    return Ok(());
                }
                result = self.get_updates(offset) => result,
            };

            match updates {
                Ok(updates) => {
                    // Serial: one learner's intents are never reordered
                    for update in &updates {
                        offset = Some(update.update_id + 1);
                        self.process(&coordinator, update).await;
                    }
                }
                Err(e) => {
                    warn!("Telegram poll failed: {:#}", e);
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl FrontEnd for TelegramBot {
    async fn deliver(&self, learner_id: LearnerId, presentations: &[Presentation]) -> Result<()> {
        // Private chats share the user's id
        for presentation in presentations {
            self.send_presentation(learner_id, presentation).await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::IntentKind;

    fn update(json: serde_json::Value) -> TelegramUpdate {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(TelegramConfig::new("123456:ABC-DEF").is_configured());
        assert!(!TelegramConfig::new("").is_configured());
        assert!(!TelegramConfig::new("invalid").is_configured());
    }

    #[test]
    fn test_api_url_generation() {
        let config = TelegramConfig::new("123:ABC");
        assert_eq!(config.api_url("getUpdates"), "https://api.telegram.org/bot123:ABC/getUpdates");
    }

    #[test]
    fn test_inline_keyboard_one_button_per_row() {
        let keyboard = inline_keyboard(&[ButtonOption::new("menu:vocab", "Vocabulary"), ButtonOption::new("menu:help", "Help")]);
        let rows = keyboard["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["callback_data"], "menu:vocab");
        assert_eq!(rows[1][0]["text"], "Help");
    }

    #[test]
    fn test_text_message_becomes_free_text() {
        let u = update(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "chat": { "id": 42 },
                "from": { "id": 42, "is_bot": false, "first_name": "Sara" },
                "text": "  I like apples.  "
            }
        }));
        let (intent, callback) = intent_from_update(&u).unwrap();
        assert_eq!(intent.learner_id, 42);
        assert_eq!(intent.display_name, "Sara");
        assert_eq!(intent.kind, IntentKind::FreeText("I like apples.".into()));
        assert!(callback.is_none());
    }

    #[test]
    fn test_menu_commands_exit() {
        for text in ["/start", "/menu", "/menu@lingua_bot"] {
            let u = update(serde_json::json!({
                "update_id": 2,
                "message": {
                    "message_id": 11,
                    "chat": { "id": 7 },
                    "from": { "id": 7, "first_name": "Ali" },
                    "text": text
                }
            }));
            let (intent, _) = intent_from_update(&u).unwrap();
            assert_eq!(intent.kind, IntentKind::ExitMenu, "{}", text);
        }
    }

    #[test]
    fn test_callback_becomes_button_choice() {
        let u = update(serde_json::json!({
            "update_id": 3,
            "callback_query": {
                "id": "cb-1",
                "from": { "id": 9, "first_name": "Mina" },
                "data": "assess:0:2"
            }
        }));
        let (intent, callback) = intent_from_update(&u).unwrap();
        assert_eq!(intent.kind, IntentKind::ButtonChoice("assess:0:2".into()));
        assert_eq!(callback.as_deref(), Some("cb-1"));
    }

    #[test]
    fn test_bots_and_non_text_ignored() {
        let from_bot = update(serde_json::json!({
            "update_id": 4,
            "message": {
                "message_id": 12,
                "chat": { "id": 5 },
                "from": { "id": 5, "is_bot": true, "first_name": "Bot" },
                "text": "hello"
            }
        }));
        assert!(intent_from_update(&from_bot).is_none());

        let sticker = update(serde_json::json!({
            "update_id": 5,
            "message": {
                "message_id": 13,
                "chat": { "id": 6 },
                "from": { "id": 6, "first_name": "Reza" }
            }
        }));
        assert!(intent_from_update(&sticker).is_none());
    }
}
