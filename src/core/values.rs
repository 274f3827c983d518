//! Estimate store consulted during linearization.

use crate::core::key::Key;
use crate::error::{SmartFactorError, SmartFactorResult};
use crate::manifold::se3::SE3;
use std::collections::HashMap;

/// Read-only access to the current pose estimates.
///
/// The smart factor only ever reads from the store; implementations must be safe to share
/// between threads so independent factors can be linearized in parallel.
pub trait EstimateStore: Send + Sync {
    /// Pose estimate for `key`, failing with [`SmartFactorError::KeyNotFound`] if absent.
    fn pose(&self, key: Key) -> SmartFactorResult<&SE3>;
}

/// Hash map of pose estimates.
#[derive(Debug, Clone, Default)]
pub struct Values {
    poses: HashMap<Key, SE3>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the estimate stored under `key`, returning the previous one.
    pub fn insert(&mut self, key: Key, pose: SE3) -> Option<SE3> {
        self.poses.insert(key, pose)
    }

    pub fn get(&self, key: Key) -> Option<&SE3> {
        self.poses.get(&key)
    }

    pub fn contains(&self, key: Key) -> bool {
        self.poses.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

impl EstimateStore for Values {
    fn pose(&self, key: Key) -> SmartFactorResult<&SE3> {
        self.poses.get(&key).ok_or(SmartFactorError::KeyNotFound(key))
    }
}

impl FromIterator<(Key, SE3)> for Values {
    fn from_iter<I: IntoIterator<Item = (Key, SE3)>>(iter: I) -> Self {
        Values {
            poses: iter.into_iter().collect(),
        }
    }
}
