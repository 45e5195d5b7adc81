use crate::error::ShardResult;
use crate::rule::sharding_rule::ShardingRule;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Copy-on-write holder of the current [`ShardingRule`].
///
/// Each routing pass takes one snapshot and keeps it for the whole statement,
/// so a concurrent storage-unit change is either fully visible or not at all.
#[derive(Debug)]
pub struct RuleStore {
    current: RwLock<Arc<ShardingRule>>,
}

impl RuleStore {
    pub fn new(rule: ShardingRule) -> Self {
        Self {
            current: RwLock::new(Arc::new(rule)),
        }
    }

    pub fn snapshot(&self) -> Arc<ShardingRule> {
        self.current.read().clone()
    }

    pub fn replace(&self, rule: ShardingRule) {
        *self.current.write() = Arc::new(rule);
    }

    pub fn add_storage_unit(&self, name: &str) -> ShardResult<()> {
        let mut guard = self.current.write();
        let next = guard.with_storage_unit(name)?;
        *guard = Arc::new(next);
        info!("Storage unit '{}' added", name);
        Ok(())
    }

    pub fn remove_storage_unit(&self, name: &str) -> ShardResult<()> {
        let mut guard = self.current.write();
        let next = guard.without_storage_unit(name)?;
        *guard = Arc::new(next);
        info!("Storage unit '{}' removed", name);
        Ok(())
    }
}
