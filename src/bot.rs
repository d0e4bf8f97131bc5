use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::UpdateKind;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::extractor::{Resolution, VideoResolver};
use crate::links;

pub const WELCOME_TEXT: &str = "🎬 Welcome! Send a YouTube, Twitter, Instagram, or Facebook video link to get the direct video URL.";
pub const UNSUPPORTED_TEXT: &str =
    "❌ Unsupported URL. Please send a YouTube, Instagram, Twitter, or Facebook link.";
pub const PROCESSING_TEXT: &str = "🔄 Fetching direct video URL, please wait...";
pub const NOT_FOUND_TEXT: &str = "⚠️ Sorry, could not extract a direct video URL.";
pub const GENERIC_ERROR_TEXT: &str =
    "❌ Error: something went wrong while extracting the video.";

fn success_text(url: &str) -> String {
    format!("✅ Here is your direct video URL:\n\n{url}")
}

fn error_text(detail: &str) -> String {
    format!("❌ Error: {detail}")
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: String) -> Result<()>;
}

#[async_trait]
impl ReplySink for Bot {
    async fn send_text(&self, chat_id: ChatId, text: String) -> Result<()> {
        self.send_message(chat_id, text).await?;
        Ok(())
    }
}

/// Process-wide context, built once in `main` and shared by both the
/// webhook server and the polling dispatcher.
pub struct AppState {
    pub config: Config,
    sink: Arc<dyn ReplySink>,
    resolver: Arc<dyn VideoResolver>,
}

impl AppState {
    pub fn new(config: Config, sink: Arc<dyn ReplySink>, resolver: Arc<dyn VideoResolver>) -> Self {
        Self {
            config,
            sink,
            resolver,
        }
    }

    pub fn bot_token(&self) -> &str {
        &self.config.telegram.bot_token
    }

    pub async fn handle_update(&self, update: &Update) -> Result<()> {
        match &update.kind {
            UpdateKind::Message(msg) => self.handle_message(msg).await,
            _ => {
                debug!("Ignoring non-message update {:?}", update.id);
                Ok(())
            }
        }
    }

    pub async fn handle_message(&self, msg: &Message) -> Result<()> {
        match msg.text() {
            Some(text) => self.handle_text(msg.chat.id, text).await,
            None => Ok(()),
        }
    }

    pub async fn handle_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        info!("Message from chat {}: {}", chat_id.0, text);

        if let Some(command) = command_name(text) {
            if command.eq_ignore_ascii_case("start") {
                self.reply(chat_id, WELCOME_TEXT).await?;
            } else {
                debug!("Ignoring command /{}", command);
            }
            return Ok(());
        }

        let url = text.trim();
        if !links::is_supported(url) {
            self.reply(chat_id, UNSUPPORTED_TEXT).await?;
            return Ok(());
        }

        self.reply(chat_id, PROCESSING_TEXT).await?;

        let reply = match self.resolver.resolve(url).await {
            Resolution::Found(direct) => success_text(&direct),
            Resolution::NotFound => NOT_FOUND_TEXT.to_string(),
            Resolution::Failed(detail) => {
                error!("Extraction failed for {}: {}", url, detail);
                if self.config.replies.expose_errors {
                    error_text(&detail)
                } else {
                    GENERIC_ERROR_TEXT.to_string()
                }
            }
        };
        self.reply(chat_id, reply).await
    }

    async fn reply(&self, chat_id: ChatId, text: impl Into<String>) -> Result<()> {
        self.sink.send_text(chat_id, text.into()).await
    }
}

/// Command name without the leading slash or `@botname` suffix. A slash
/// followed by whitespace is plain text, not a command.
fn command_name(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('/')?;
    if rest.starts_with(char::is_whitespace) {
        return None;
    }
    let word = rest.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Run the bot over long polling instead of the webhook.
pub async fn run_polling(bot: Bot, state: Arc<AppState>) -> Result<()> {
    info!("Starting Telegram bot in polling mode...");

    let handler = Update::filter_message().endpoint(handle_polled_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_polled_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Err(e) = state.handle_message(&msg).await {
        error!("Error handling message: {:#}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_state, FailingSink, FakeResolver, RecordingSink};

    const CHAT: ChatId = ChatId(42);

    async fn run(text: &str, resolution: Resolution) -> (Vec<String>, Vec<String>) {
        let sink = Arc::new(RecordingSink::default());
        let resolver = Arc::new(FakeResolver::new(resolution));
        let state = test_state(sink.clone(), resolver.clone());
        state.handle_text(CHAT, text).await.unwrap();
        (sink.texts(), resolver.calls())
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name("/start"), Some("start"));
        assert_eq!(command_name("/start@linkgrab_bot"), Some("start"));
        assert_eq!(command_name("/start deep-link"), Some("start"));
        assert_eq!(command_name("/help"), Some("help"));
        assert_eq!(command_name("/"), None);
        assert_eq!(command_name("/ https://youtu.be/x"), None);
        assert_eq!(command_name("/START"), Some("START"));
        assert_eq!(command_name("https://youtu.be/abc"), None);
    }

    #[tokio::test]
    async fn test_start_sends_welcome() {
        let (texts, calls) = run("/start", Resolution::NotFound).await;
        assert_eq!(texts, vec![WELCOME_TEXT.to_string()]);
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn test_start_is_case_insensitive() {
        for text in ["/START", "/Start@linkgrab_bot"] {
            let (texts, _) = run(text, Resolution::NotFound).await;
            assert_eq!(texts, vec![WELCOME_TEXT.to_string()], "{text:?}");
        }
    }

    #[tokio::test]
    async fn test_slash_then_space_is_handled_as_text() {
        let (texts, calls) = run(
            "/ https://youtu.be/x",
            Resolution::Found("https://cdn/x.mp4".into()),
        )
        .await;
        assert_eq!(calls, vec!["/ https://youtu.be/x".to_string()]);
        assert_eq!(texts[0], PROCESSING_TEXT);
    }

    #[tokio::test]
    async fn test_send_failure_is_returned() {
        let resolver = Arc::new(FakeResolver::new(Resolution::NotFound));
        let state = test_state(Arc::new(FailingSink), resolver.clone());
        let result = state.handle_text(CHAT, "https://youtu.be/abc").await;
        assert!(result.is_err());
        assert!(resolver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_other_commands_are_ignored() {
        let (texts, calls) = run("/help https://youtu.be/abc", Resolution::NotFound).await;
        assert!(texts.is_empty());
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_text_is_rejected_without_resolving() {
        for text in ["hello", "https://vimeo.com/1", "   "] {
            let (texts, calls) = run(text, Resolution::NotFound).await;
            assert_eq!(texts, vec![UNSUPPORTED_TEXT.to_string()], "{text:?}");
            assert!(calls.is_empty(), "{text:?}");
        }
    }

    #[tokio::test]
    async fn test_supported_link_is_resolved() {
        let (texts, calls) = run(
            "  https://WWW.YouTube.com/watch?v=abc \n",
            Resolution::Found("https://cdn.example.com/v.mp4".into()),
        )
        .await;
        assert_eq!(calls, vec!["https://WWW.YouTube.com/watch?v=abc".to_string()]);
        assert_eq!(
            texts,
            vec![
                PROCESSING_TEXT.to_string(),
                "✅ Here is your direct video URL:\n\nhttps://cdn.example.com/v.mp4".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_every_supported_site_triggers_resolution() {
        for site in links::SUPPORTED_SITES {
            let (_, calls) = run(&format!("https://{site}/v/1"), Resolution::NotFound).await;
            assert_eq!(calls.len(), 1, "{site}");
        }
    }

    #[tokio::test]
    async fn test_not_found_reply() {
        let (texts, _) = run("https://x.com/user/status/1", Resolution::NotFound).await;
        assert_eq!(
            texts,
            vec![PROCESSING_TEXT.to_string(), NOT_FOUND_TEXT.to_string()]
        );
    }

    #[tokio::test]
    async fn test_failure_detail_is_shown() {
        let (texts, _) = run(
            "https://instagram.com/reel/1",
            Resolution::Failed("timeout".into()),
        )
        .await;
        assert_eq!(texts.len(), 2);
        assert!(texts[1].contains("timeout"));
        assert_eq!(texts[1], "❌ Error: timeout");
    }

    #[tokio::test]
    async fn test_failure_detail_hidden_when_disabled() {
        let sink = Arc::new(RecordingSink::default());
        let resolver = Arc::new(FakeResolver::new(Resolution::Failed(
            "ERROR: secret internals".into(),
        )));
        let mut state = test_state(sink.clone(), resolver);
        state.config.replies.expose_errors = false;

        state
            .handle_text(CHAT, "https://facebook.com/watch/?v=1")
            .await
            .unwrap();

        let texts = sink.texts();
        assert_eq!(texts[1], GENERIC_ERROR_TEXT);
        assert!(!texts[1].contains("secret"));
    }

    #[tokio::test]
    async fn test_replies_go_to_sender_chat() {
        let sink = Arc::new(RecordingSink::default());
        let state = test_state(sink.clone(), Arc::new(FakeResolver::new(Resolution::NotFound)));
        state.handle_text(ChatId(-1001), "hi").await.unwrap();
        assert_eq!(sink.chats(), vec![ChatId(-1001)]);
    }
}
