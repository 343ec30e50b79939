// chatrelay
// Message relay agent core: resolves operator remarks to live chat targets,
// drains the outbound command queue and archives inbound traffic.

pub mod archive;
#[cfg(feature = "bridge")]
pub mod bridge;
pub mod cache;
pub mod clock;
pub mod command;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod inbound;
pub mod platform;
pub mod queue;
pub mod resolver;
pub mod target;

pub use archive::{MessageArchive, SELF_LABEL};
pub use cache::{DirectoryEntry, DirectoryIndex, EchoCache, EchoRecord, RecallWindow};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{AdHocAddress, Command, QueueMode};
pub use config::{BridgeConfig, RelayConfig};
pub use context::{QueueKeys, RelayContext};
pub use dispatch::{DispatchLoop, DispatchOutcome};
pub use error::{RelayError, RelayResult, ResolutionError};
pub use inbound::{ArchivedLine, InboundHandler};
pub use platform::{InboundMessage, MessagePayload, MessagingClient, PlatformEvent};
pub use queue::{InMemoryQueueStore, QueueStore, RedisQueueStore};
pub use resolver::IdentityResolver;
pub use target::{Group, Individual, IndividualQuery, MessageHandle, OutgoingContent, Target, TargetKind};
