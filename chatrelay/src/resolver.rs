//! Identity resolution: maps operator remarks and display labels to live
//! platform targets, and platform ids back to remarks for attribution.
//!
//! Three maps are kept and written through together:
//! - remark -> target
//! - target id -> remark
//! - (display name, kind) -> target
//!
//! Entries are never evicted. A directory lookup is only trusted when it
//! returns exactly one candidate, and non-friend individuals never populate
//! the remark/name maps; instead a background sync is requested so a later
//! lookup can see the refreshed contact.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::error::ResolutionError;
use crate::platform::MessagingClient;
use crate::target::{IndividualQuery, Target, TargetKind};

pub struct IdentityResolver {
    client: Arc<dyn MessagingClient>,
    by_remark: DashMap<String, Target>,
    remark_by_id: DashMap<String, String>,
    by_name: DashMap<(String, TargetKind), Target>,
}

/// Outcome of a single exact-match directory query.
enum Lookup {
    Unique(Target),
    Count(usize),
}

impl Lookup {
    fn from_results(mut results: Vec<Target>) -> Self {
        if results.len() == 1 {
            Lookup::Unique(results.remove(0))
        } else {
            Lookup::Count(results.len())
        }
    }
}

impl IdentityResolver {
    pub fn new(client: Arc<dyn MessagingClient>) -> Self {
        Self {
            client,
            by_remark: DashMap::new(),
            remark_by_id: DashMap::new(),
            by_name: DashMap::new(),
        }
    }

    /// Resolve an operator remark (the queue key of a NORMAL queue).
    pub async fn resolve_by_short_name(&self, remark: &str) -> Result<Target, ResolutionError> {
        if let Some(target) = self.by_remark.get(remark).map(|t| t.clone()) {
            self.remark_by_id
                .insert(target.id().to_string(), remark.to_string());
            return Ok(target);
        }
        // The remark may simply be the contact's display name.
        if let Some(target) = self.cached_by_name(remark, TargetKind::Individual) {
            self.remark_by_id
                .insert(target.id().to_string(), remark.to_string());
            return Ok(target);
        }

        let target = self.lookup_individual(remark).await?;
        self.remark_by_id
            .insert(target.id().to_string(), remark.to_string());
        if target.is_friend() {
            self.by_remark.insert(remark.to_string(), target.clone());
            self.by_name.insert(
                (target.display_name().to_string(), TargetKind::Individual),
                target.clone(),
            );
            info!("Resolved remark '{}' to {}", remark, target);
        } else {
            self.request_sync(&target);
        }
        Ok(target)
    }

    /// Resolve an ad-hoc label (from `#name#text` syntax) of the given kind.
    pub async fn resolve_by_label_and_kind(
        &self,
        label: &str,
        kind: TargetKind,
    ) -> Result<Target, ResolutionError> {
        match kind {
            TargetKind::Individual => {
                if let Some(target) = self.by_remark.get(label).map(|t| t.clone()) {
                    return Ok(target);
                }
                if let Some(target) = self.cached_by_name(label, TargetKind::Individual) {
                    return Ok(target);
                }
                let target = self.lookup_individual(label).await?;
                if target.is_friend() {
                    self.by_name
                        .insert((label.to_string(), TargetKind::Individual), target.clone());
                    self.remark_by_id
                        .insert(target.id().to_string(), label.to_string());
                    info!("Resolved contact '{}' to {}", label, target);
                } else {
                    self.request_sync(&target);
                }
                Ok(target)
            }
            TargetKind::Group => {
                if let Some(target) = self.cached_by_name(label, TargetKind::Group) {
                    return Ok(target);
                }
                let results = self
                    .client
                    .find_groups(label)
                    .await
                    .map_err(|e| ResolutionError::Lookup(e.to_string()))?;
                let target = match Lookup::from_results(results) {
                    Lookup::Unique(target) => target,
                    Lookup::Count(n) => return Err(Self::unresolved(label, n)),
                };
                let Target::Group(group) = &target else {
                    return Err(ResolutionError::Lookup(format!(
                        "group lookup for '{}' returned {}",
                        label, target
                    )));
                };
                match self.client.current_topic(group).await {
                    Ok(topic) if topic == label => {
                        self.by_name
                            .insert((label.to_string(), TargetKind::Group), target.clone());
                        self.remark_by_id
                            .insert(target.id().to_string(), label.to_string());
                        info!("Resolved room '{}' to {}", label, target);
                    }
                    Ok(topic) => {
                        debug!(
                            "Room topic drifted from '{}' to '{}', not caching",
                            label, topic
                        );
                    }
                    Err(e) => {
                        warn!("Failed to verify topic of {}: {}", target, e);
                    }
                }
                Ok(target)
            }
        }
    }

    /// Cached remark for a platform id. Never hits the network.
    pub fn label_for(&self, target_id: &str) -> Option<String> {
        self.remark_by_id.get(target_id).map(|r| r.clone())
    }

    pub fn cached_by_remark(&self, remark: &str) -> Option<Target> {
        self.by_remark.get(remark).map(|t| t.clone())
    }

    pub fn cached_by_name(&self, name: &str, kind: TargetKind) -> Option<Target> {
        self.by_name
            .get(&(name.to_string(), kind))
            .map(|t| t.clone())
    }

    /// Alias lookup first, display-name lookup second; both exact-match and
    /// both must yield exactly one candidate.
    async fn lookup_individual(&self, label: &str) -> Result<Target, ResolutionError> {
        let by_alias = self.query_individuals(IndividualQuery::Alias(label.to_string())).await?;
        let alias_count = match by_alias {
            Lookup::Unique(target) => return Ok(target),
            Lookup::Count(n) => n,
        };
        let by_name = self.query_individuals(IndividualQuery::Name(label.to_string())).await?;
        match by_name {
            Lookup::Unique(target) => Ok(target),
            Lookup::Count(name_count) => Err(Self::unresolved(label, alias_count.max(name_count))),
        }
    }

    async fn query_individuals(&self, query: IndividualQuery) -> Result<Lookup, ResolutionError> {
        let results = self
            .client
            .find_individuals(query)
            .await
            .map_err(|e| ResolutionError::Lookup(e.to_string()))?;
        Ok(Lookup::from_results(results))
    }

    fn unresolved(label: &str, matches: usize) -> ResolutionError {
        if matches == 0 {
            ResolutionError::NotFound {
                label: label.to_string(),
            }
        } else {
            ResolutionError::Ambiguous {
                label: label.to_string(),
                matches,
            }
        }
    }

    fn request_sync(&self, target: &Target) {
        info!("{} is not a friend, requesting directory sync", target);
        let client = Arc::clone(&self.client);
        let target = target.clone();
        tokio::spawn(async move {
            if let Err(e) = client.sync(&target).await {
                warn!("Sync of {} failed: {}", target, e);
            }
        });
    }
}
