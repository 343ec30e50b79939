//! Outbound dispatch loop.
//!
//! On every tick the remark list is re-read from the queue store and each
//! remark's queue is drained completely, one message at a time, before the
//! next remark is visited. Every failure is logged and the message dropped;
//! nothing is retried or requeued.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::archive::SELF_LABEL;
use crate::cache::EchoRecord;
use crate::command::{AdHocAddress, Command, QueueMode};
use crate::context::RelayContext;
use crate::error::{RelayError, RelayResult, ResolutionError};
use crate::target::{MessageHandle, OutgoingContent, Target};

/// What happened to a single queued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent {
        label: String,
        target_id: String,
        handle: MessageHandle,
    },
    Revoked {
        label: String,
        handle: MessageHandle,
        accepted: bool,
    },
    NothingToRevoke {
        label: String,
    },
    SearchDelivered {
        query: String,
        matches: usize,
    },
}

pub struct DispatchLoop {
    ctx: Arc<RelayContext>,
    period: Duration,
}

impl DispatchLoop {
    pub fn new(ctx: Arc<RelayContext>, period: Duration) -> Self {
        Self { ctx, period }
    }

    pub async fn run(&self) {
        info!(
            "[Dispatch] Starting dispatch loop (every {}s)",
            self.period.as_secs_f32()
        );
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let processed = self.tick().await;
            if processed > 0 {
                debug!("[Dispatch] Tick processed {} message(s)", processed);
            }
        }
    }

    /// Drain every known queue once. Returns the number of messages popped.
    pub async fn tick(&self) -> usize {
        let mut processed = 0;
        for key in self.queue_keys().await {
            processed += self.drain(&key).await;
        }
        processed
    }

    /// Remarks from the store, followed by the reserved ad-hoc keys.
    async fn queue_keys(&self) -> Vec<String> {
        let keys = &self.ctx.keys;
        let mut remarks = match self.ctx.queue.members(&keys.remark_list).await {
            Ok(remarks) => remarks,
            Err(e) => {
                warn!("[Dispatch] Failed to read '{}': {}", keys.remark_list, e);
                Vec::new()
            }
        };
        for reserved in [&keys.other, &keys.group] {
            if !remarks.iter().any(|r| r == reserved) {
                remarks.push(reserved.clone());
            }
        }
        remarks
    }

    async fn drain(&self, key: &str) -> usize {
        let mode = QueueMode::for_key(key, &self.ctx.keys.other, &self.ctx.keys.group);
        let mut popped = 0;
        loop {
            let body = match self.ctx.queue.pop_front(key).await {
                Ok(Some(body)) => body,
                Ok(None) => break,
                Err(e) => {
                    warn!("[Dispatch] Failed to pop '{}': {}", key, e);
                    break;
                }
            };
            popped += 1;
            // Errors are already logged; the message is dropped either way.
            let _ = self.process(key, mode, &body).await;
        }
        popped
    }

    /// Resolve, execute and record a single queued message.
    pub async fn process(
        &self,
        key: &str,
        mode: QueueMode,
        body: &str,
    ) -> RelayResult<DispatchOutcome> {
        let result = self.execute(key, mode, body).await;
        if let Err(e) = &result {
            log_drop(key, body, e);
        }
        result
    }

    async fn execute(&self, key: &str, mode: QueueMode, body: &str) -> RelayResult<DispatchOutcome> {
        let (target, label, text) = match mode.ad_hoc_kind() {
            None => {
                let target = self.ctx.resolver.resolve_by_short_name(key).await?;
                (target, key.to_string(), body.to_string())
            }
            Some(kind) => {
                let address = AdHocAddress::parse(body)?;
                let target = self
                    .ctx
                    .resolver
                    .resolve_by_label_and_kind(&address.name, kind)
                    .await?;
                (target, address.name, address.text)
            }
        };

        match Command::parse(&text) {
            Command::Revoke => self.revoke(&target, &label).await,
            Command::SendFile(path) => {
                self.send(&target, &label, OutgoingContent::File(path), &text)
                    .await
            }
            Command::Contact(query) => self.deliver_search(&query).await,
            Command::Text(text) => {
                self.send(&target, &label, OutgoingContent::Text(text.clone()), &text)
                    .await
            }
        }
    }

    async fn send(
        &self,
        target: &Target,
        label: &str,
        content: OutgoingContent,
        log_text: &str,
    ) -> RelayResult<DispatchOutcome> {
        let handle = self.ctx.client.say(target, content).await?;
        info!("from({}), to({}): {}", SELF_LABEL, label, log_text);

        self.ctx.archive.record(SELF_LABEL, label, log_text).await;
        self.ctx.recall_window.record(target.id(), handle.clone());
        self.ctx
            .echo_cache
            .put(&handle.id, EchoRecord::new(SELF_LABEL, label, log_text));

        Ok(DispatchOutcome::Sent {
            label: label.to_string(),
            target_id: target.id().to_string(),
            handle,
        })
    }

    async fn revoke(&self, target: &Target, label: &str) -> RelayResult<DispatchOutcome> {
        let Some(handle) = self.ctx.recall_window.take_most_recent(target.id()) else {
            info!("[Dispatch] Nothing recent to revoke for '{}'", label);
            return Ok(DispatchOutcome::NothingToRevoke {
                label: label.to_string(),
            });
        };
        let accepted = self.ctx.client.recall(&handle).await?;
        if accepted {
            info!("[Dispatch] Revoked message {} to '{}'", handle.id, label);
        } else {
            warn!(
                "[Dispatch] Platform refused to revoke message {} to '{}'",
                handle.id, label
            );
        }
        Ok(DispatchOutcome::Revoked {
            label: label.to_string(),
            handle,
            accepted,
        })
    }

    /// Run a directory search and deliver the result to the account itself.
    async fn deliver_search(&self, query: &str) -> RelayResult<DispatchOutcome> {
        let matches = self.ctx.directory.search(query);
        let payload = serde_json::to_string(&matches)?;
        let me = self.ctx.client.self_target().await?;
        self.ctx
            .client
            .say(&me, OutgoingContent::Text(payload))
            .await?;
        debug!(
            "to({}): {} directory match(es) for '{}'",
            SELF_LABEL,
            matches.len(),
            query
        );
        Ok(DispatchOutcome::SearchDelivered {
            query: query.to_string(),
            matches: matches.len(),
        })
    }
}

fn log_drop(key: &str, body: &str, err: &RelayError) {
    match err {
        RelayError::Resolution(ResolutionError::NotFound { label }) => {
            warn!(
                "[Dispatch] Dropping message on '{}': no contact matches '{}' (0 matches)",
                key, label
            );
        }
        RelayError::Resolution(ResolutionError::Ambiguous { label, matches }) => {
            warn!(
                "[Dispatch] Dropping message on '{}': '{}' is ambiguous ({} matches)",
                key, label, matches
            );
        }
        RelayError::Malformed(reason) => {
            warn!("[Dispatch] Dropping malformed message on '{}': {}", key, reason);
        }
        RelayError::Transport(reason) => {
            error!(
                "[Dispatch] Send failed on '{}' ({}): {}",
                key, body, reason
            );
        }
        other => {
            error!("[Dispatch] Failed to process message on '{}': {}", key, other);
        }
    }
}
