//! The single object that owns every cache shared by the dispatch loop and
//! the inbound handler.

use std::sync::Arc;

use tracing::{info, warn};

use crate::archive::MessageArchive;
use crate::cache::{DirectoryIndex, EchoCache, RecallWindow};
use crate::clock::{Clock, SystemClock};
use crate::config::RelayConfig;
use crate::error::RelayResult;
use crate::platform::MessagingClient;
use crate::queue::QueueStore;
use crate::resolver::IdentityResolver;

/// Store keys the relay reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    pub remark_list: String,
    pub room_list: String,
    pub msg_count: String,
    pub other: String,
    pub group: String,
}

impl From<&RelayConfig> for QueueKeys {
    fn from(config: &RelayConfig) -> Self {
        Self {
            remark_list: config.remark_list_key.clone(),
            room_list: config.room_list_key.clone(),
            msg_count: config.msg_count_key.clone(),
            other: config.other_key.clone(),
            group: config.group_key.clone(),
        }
    }
}

pub struct RelayContext {
    pub client: Arc<dyn MessagingClient>,
    pub queue: Arc<dyn QueueStore>,
    pub resolver: IdentityResolver,
    pub recall_window: RecallWindow,
    pub echo_cache: EchoCache,
    pub directory: DirectoryIndex,
    pub archive: MessageArchive,
    pub keys: QueueKeys,
}

impl RelayContext {
    pub fn new(
        config: &RelayConfig,
        client: Arc<dyn MessagingClient>,
        queue: Arc<dyn QueueStore>,
    ) -> RelayResult<Self> {
        Self::with_clock(config, client, queue, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &RelayConfig,
        client: Arc<dyn MessagingClient>,
        queue: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
    ) -> RelayResult<Self> {
        config.validate()?;
        Ok(Self {
            resolver: IdentityResolver::new(Arc::clone(&client)),
            recall_window: RecallWindow::with_clock(config.recall_window(), Arc::clone(&clock)),
            echo_cache: EchoCache::with_clock(config.echo_capacity()?, config.echo_ttl(), clock),
            directory: DirectoryIndex::new(),
            archive: MessageArchive::new(
                config.message_log.clone(),
                config.audit_log_dir.clone(),
                config.attachment_dir.clone(),
            ),
            keys: QueueKeys::from(config),
            client,
            queue,
        })
    }

    /// Rebuild the directory index from a full listing of individuals.
    ///
    /// On failure the previous index is kept.
    pub async fn dump_directory(&self) -> usize {
        match self.client.list_individuals().await {
            Ok(targets) => {
                self.directory.rebuild_from_targets(&targets);
                let size = self.directory.len();
                info!("Directory dump complete: {} entries", size);
                size
            }
            Err(e) => {
                warn!("Directory dump failed, keeping previous index: {}", e);
                self.directory.len()
            }
        }
    }
}
