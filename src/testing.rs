//! In-process stand-ins for the chat API and the extractor.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use teloxide::types::ChatId;

use crate::bot::{AppState, ReplySink};
use crate::config::Config;
use crate::extractor::{Resolution, VideoResolver};

pub const TEST_TOKEN: &str = "123456:test-token";

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(ChatId, String)>>,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn chats(&self) -> Vec<ChatId> {
        self.sent.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send_text(&self, chat_id: ChatId, text: String) -> Result<()> {
        self.sent.lock().unwrap().push((chat_id, text));
        Ok(())
    }
}

/// Chat API that rejects every send.
pub struct FailingSink;

#[async_trait]
impl ReplySink for FailingSink {
    async fn send_text(&self, _chat_id: ChatId, _text: String) -> Result<()> {
        anyhow::bail!("Forbidden: bot was blocked by the user")
    }
}

pub struct FakeResolver {
    outcome: Resolution,
    calls: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn new(outcome: Resolution) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoResolver for FakeResolver {
    async fn resolve(&self, page_url: &str) -> Resolution {
        self.calls.lock().unwrap().push(page_url.to_string());
        self.outcome.clone()
    }
}

pub fn test_state(sink: Arc<dyn ReplySink>, resolver: Arc<dyn VideoResolver>) -> AppState {
    let mut config = Config::default();
    config.telegram.bot_token = TEST_TOKEN.to_string();
    AppState::new(config, sink, resolver)
}
