//! Inbound event handling: attribution, archiving and retraction enrichment.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::archive::SELF_LABEL;
use crate::cache::EchoRecord;
use crate::context::RelayContext;
use crate::platform::{InboundMessage, MessagePayload, PlatformEvent};
use crate::target::Target;

pub const RECALL_PLACEHOLDER: &str = "<unavailable>";

/// Line written to the archive for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedLine {
    pub from: String,
    pub to: String,
    pub text: String,
}

pub struct InboundHandler {
    ctx: Arc<RelayContext>,
}

impl InboundHandler {
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        Self { ctx }
    }

    /// Consume events until every sender is dropped.
    pub async fn run(&self, mut events: mpsc::Receiver<PlatformEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("[Inbound] Event channel closed");
    }

    pub async fn handle_event(&self, event: PlatformEvent) -> Option<ArchivedLine> {
        match event {
            PlatformEvent::Message(message) => self.on_message(message).await,
            PlatformEvent::Login { user } => {
                info!("[Inbound] {} logged in", user);
                None
            }
            PlatformEvent::Logout { user } => {
                info!("[Inbound] {} logged out", user);
                None
            }
        }
    }

    pub async fn on_message(&self, message: InboundMessage) -> Option<ArchivedLine> {
        if let Some(room) = &message.room {
            if !self.room_allowed(room).await {
                debug!("[Inbound] Ignoring message from unlisted room {}", room);
                return None;
            }
        }

        let from = if message.self_sent {
            SELF_LABEL.to_string()
        } else {
            self.label_of(&message.talker)
        };
        let to = match (&message.room, &message.listener) {
            (Some(room), _) => self.label_of(room),
            (None, Some(listener)) if message.self_sent => self.label_of(listener),
            _ => SELF_LABEL.to_string(),
        };

        let line = match message.payload {
            MessagePayload::Text { text } => {
                self.ctx
                    .echo_cache
                    .put(&message.id, EchoRecord::new(&from, &to, &text));
                ArchivedLine { from, to, text }
            }
            MessagePayload::Attachment { file_name, bytes } => {
                let text = match self.ctx.archive.save_attachment(&file_name, &bytes).await {
                    Some(path) => format!("[file] {}", path.display()),
                    None => format!("[file] {} (not saved)", file_name),
                };
                self.ctx
                    .echo_cache
                    .put(&message.id, EchoRecord::new(&from, &to, &text));
                ArchivedLine { from, to, text }
            }
            MessagePayload::Recalled { original_id } => match self.ctx.echo_cache.get(&original_id) {
                Some(original) => ArchivedLine {
                    from: original.from,
                    to: original.to,
                    text: format!("[recalled] {}", original.text),
                },
                None => {
                    debug!("[Inbound] No echo record for recalled message {}", original_id);
                    ArchivedLine {
                        from,
                        to,
                        text: format!("[recalled] {}", RECALL_PLACEHOLDER),
                    }
                }
            },
            MessagePayload::Unsupported { kind } => ArchivedLine {
                from,
                to,
                text: format!("[{}]", kind),
            },
        };

        self.ctx
            .archive
            .record(&line.from, &line.to, &line.text)
            .await;
        if let Err(e) = self.ctx.queue.increment(&self.ctx.keys.msg_count).await {
            warn!("[Inbound] Failed to bump '{}': {}", self.ctx.keys.msg_count, e);
        }
        Some(line)
    }

    /// Remark if known, then display name, then platform alias, then raw id.
    pub fn label_of(&self, target: &Target) -> String {
        if let Some(remark) = self.ctx.resolver.label_for(target.id()) {
            return remark;
        }
        let name = target.display_name();
        if !name.is_empty() {
            return name.to_string();
        }
        target
            .alias()
            .map(str::to_string)
            .unwrap_or_else(|| target.id().to_string())
    }

    async fn room_allowed(&self, room: &Target) -> bool {
        match self.ctx.queue.members(&self.ctx.keys.room_list).await {
            Ok(topics) => topics.iter().any(|t| t == room.display_name()),
            Err(e) => {
                warn!("[Inbound] Failed to read '{}': {}", self.ctx.keys.room_list, e);
                false
            }
        }
    }
}
