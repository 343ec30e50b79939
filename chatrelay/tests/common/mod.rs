#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use chatrelay::{
    Group, Individual, IndividualQuery, InMemoryQueueStore, ManualClock, MessageHandle,
    MessagingClient, OutgoingContent, QueueStore, RelayConfig, RelayContext, RelayError,
    RelayResult, Target,
};

pub fn friend(id: &str, name: &str, alias: Option<&str>) -> Target {
    Target::Individual(Individual {
        id: id.to_string(),
        name: name.to_string(),
        alias: alias.map(str::to_string),
        friend: true,
    })
}

pub fn stranger(id: &str, name: &str) -> Target {
    Target::Individual(Individual {
        id: id.to_string(),
        name: name.to_string(),
        alias: None,
        friend: false,
    })
}

pub fn room(id: &str, topic: &str) -> Target {
    Target::Group(Group {
        id: id.to_string(),
        topic: topic.to_string(),
    })
}

/// Platform double with per-call counters.
pub struct MockClient {
    by_alias: Mutex<HashMap<String, Vec<Target>>>,
    by_name: Mutex<HashMap<String, Vec<Target>>>,
    groups: Mutex<HashMap<String, Vec<Target>>>,
    topics: Mutex<HashMap<String, String>>,
    directory: Mutex<Vec<Target>>,
    me: Target,
    pub alias_queries: AtomicUsize,
    pub name_queries: AtomicUsize,
    pub group_queries: AtomicUsize,
    pub sync_calls: AtomicUsize,
    pub sent: Mutex<Vec<(Target, OutgoingContent)>>,
    pub recalled: Mutex<Vec<MessageHandle>>,
    pub fail_sends: AtomicBool,
    next_message: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            by_alias: Mutex::new(HashMap::new()),
            by_name: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
            topics: Mutex::new(HashMap::new()),
            directory: Mutex::new(Vec::new()),
            me: friend("self-id", "Relay Owner", None),
            alias_queries: AtomicUsize::new(0),
            name_queries: AtomicUsize::new(0),
            group_queries: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            recalled: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            next_message: AtomicUsize::new(1),
        }
    }

    pub fn with_alias(self, alias: &str, targets: Vec<Target>) -> Self {
        self.by_alias
            .lock()
            .unwrap()
            .insert(alias.to_string(), targets);
        self
    }

    pub fn with_name(self, name: &str, targets: Vec<Target>) -> Self {
        self.by_name.lock().unwrap().insert(name.to_string(), targets);
        self
    }

    /// Register a group under `topic`; its live topic is `current_topic`.
    pub fn with_group(self, topic: &str, group: Target, current_topic: &str) -> Self {
        self.topics
            .lock()
            .unwrap()
            .insert(group.id().to_string(), current_topic.to_string());
        self.groups
            .lock()
            .unwrap()
            .insert(topic.to_string(), vec![group]);
        self
    }

    pub fn with_directory(self, targets: Vec<Target>) -> Self {
        *self.directory.lock().unwrap() = targets;
        self
    }

    pub fn me(&self) -> &Target {
        &self.me
    }

    pub fn directory_queries(&self) -> usize {
        self.alias_queries.load(Ordering::SeqCst) + self.name_queries.load(Ordering::SeqCst)
    }

    pub fn syncs(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(Target, OutgoingContent)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recalled(&self) -> Vec<MessageHandle> {
        self.recalled.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingClient for MockClient {
    async fn find_individuals(&self, query: IndividualQuery) -> RelayResult<Vec<Target>> {
        let table = match &query {
            IndividualQuery::Alias(_) => {
                self.alias_queries.fetch_add(1, Ordering::SeqCst);
                &self.by_alias
            }
            IndividualQuery::Name(_) => {
                self.name_queries.fetch_add(1, Ordering::SeqCst);
                &self.by_name
            }
        };
        Ok(table
            .lock()
            .unwrap()
            .get(query.value())
            .cloned()
            .unwrap_or_default())
    }

    async fn find_groups(&self, topic: &str) -> RelayResult<Vec<Target>> {
        self.group_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .groups
            .lock()
            .unwrap()
            .get(topic)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_individuals(&self) -> RelayResult<Vec<Target>> {
        Ok(self.directory.lock().unwrap().clone())
    }

    async fn say(&self, target: &Target, content: OutgoingContent) -> RelayResult<MessageHandle> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(RelayError::Transport("connection reset".to_string()));
        }
        let n = self.next_message.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push((target.clone(), content));
        Ok(MessageHandle::new(format!("sent-{}", n)))
    }

    async fn recall(&self, handle: &MessageHandle) -> RelayResult<bool> {
        self.recalled.lock().unwrap().push(handle.clone());
        Ok(true)
    }

    async fn sync(&self, _target: &Target) -> RelayResult<()> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn current_topic(&self, group: &Group) -> RelayResult<String> {
        Ok(self
            .topics
            .lock()
            .unwrap()
            .get(&group.id)
            .cloned()
            .unwrap_or_else(|| group.topic.clone()))
    }

    async fn self_target(&self) -> RelayResult<Target> {
        Ok(self.me.clone())
    }
}

/// Let fire-and-forget tasks spawned on the test runtime run to completion.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub struct Harness {
    pub client: Arc<MockClient>,
    pub queue: Arc<InMemoryQueueStore>,
    pub clock: Arc<ManualClock>,
    pub ctx: Arc<RelayContext>,
    pub config: RelayConfig,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(client: MockClient) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = RelayConfig {
            message_log: dir.path().join("all.txt"),
            audit_log_dir: dir.path().join("audit"),
            attachment_dir: dir.path().join("attachments"),
            ..RelayConfig::default()
        };
        let client = Arc::new(client);
        let queue = Arc::new(InMemoryQueueStore::new());
        let clock = Arc::new(ManualClock::new());
        let ctx = RelayContext::with_clock(
            &config,
            Arc::clone(&client) as Arc<dyn MessagingClient>,
            Arc::clone(&queue) as Arc<dyn QueueStore>,
            Arc::clone(&clock) as Arc<dyn chatrelay::Clock>,
        )
        .expect("context");
        Self {
            client,
            queue,
            clock,
            ctx: Arc::new(ctx),
            config,
            dir,
        }
    }

    pub fn rolling_log(&self) -> String {
        std::fs::read_to_string(&self.config.message_log).unwrap_or_default()
    }

    pub fn audit_log(&self) -> String {
        let mut out = String::new();
        if let Ok(entries) = std::fs::read_dir(&self.config.audit_log_dir) {
            for entry in entries.flatten() {
                out.push_str(&std::fs::read_to_string(entry.path()).unwrap_or_default());
            }
        }
        out
    }
}
