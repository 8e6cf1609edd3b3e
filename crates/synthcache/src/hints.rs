//! Merged cache hints
//!
//! Every requester keeps its own capacity bounds. The effective bounds are
//! the most restrictive combination that still honours every requester's
//! minimum:
//!
//! ```text
//! effective_min = max(requested minimums)
//! effective_max = max(effective_min, min(requested maximums))
//! ```
//!
//! Radius and policy are single values; the last requester wins.

use std::collections::HashMap;

use ahash::RandomState;
use framesynth::{CacheOption, CachePolicy, Error, RequesterId, Result};

/// Frames kept when nobody asked for a maximum
pub const DEFAULT_MAX_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
struct CapacityRequest {
    min: Option<usize>,
    max: Option<usize>,
}

/// Frame cache tuning, mutated only through [`HintState::apply`]
#[derive(Debug, Clone)]
pub struct HintState {
    requests: HashMap<RequesterId, CapacityRequest, RandomState>,
    radius: usize,
    policy: CachePolicy,
    last_requester: Option<RequesterId>,
}

impl Default for HintState {
    fn default() -> Self {
        Self {
            requests: HashMap::with_hasher(RandomState::new()),
            radius: 0,
            policy: CachePolicy::default(),
            last_requester: None,
        }
    }
}

impl HintState {
    /// Default hints: min 0, max [`DEFAULT_MAX_CAPACITY`], LRU policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one frame cache hint. Invalid input leaves the state unchanged.
    pub fn apply(&mut self, option: CacheOption, value: i64, requester: RequesterId) -> Result<()> {
        let value = option.check_value(value)?;
        match option {
            CacheOption::SetMinCapacity => self.requests.entry(requester).or_default().min = Some(value),
            CacheOption::SetMaxCapacity => self.requests.entry(requester).or_default().max = Some(value),
            CacheOption::SetAccessRadius => self.radius = value,
            CacheOption::SetPolicy => self.policy = CachePolicy::from_code(value as i64)?,
            CacheOption::SetAudioPolicy | CacheOption::SetAudioWindow => {
                return Err(Error::configuration(format!(
                    "{} is not a frame cache option",
                    option
                )));
            }
        }
        self.last_requester = Some(requester);
        Ok(())
    }

    /// Frames the cache never evicts below
    pub fn effective_min(&self) -> usize {
        self.requests.values().filter_map(|r| r.min).max().unwrap_or(0)
    }

    /// Frames the cache may hold after an eviction sweep
    pub fn effective_max(&self) -> usize {
        let floor = self.effective_min();
        if self.policy == CachePolicy::Nothing {
            return floor;
        }
        let ceiling = self
            .requests
            .values()
            .filter_map(|r| r.max)
            .min()
            .unwrap_or(DEFAULT_MAX_CAPACITY);
        floor.max(ceiling)
    }

    /// Access radius for [`CachePolicy::Range`]
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Current retention policy
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Who sent the most recent accepted hint
    pub fn last_requester(&self) -> Option<RequesterId> {
        self.last_requester
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: RequesterId = RequesterId(1);
    const B: RequesterId = RequesterId(2);

    #[test]
    fn test_defaults() {
        let hints = HintState::new();
        assert_eq!(hints.effective_min(), 0);
        assert_eq!(hints.effective_max(), DEFAULT_MAX_CAPACITY);
        assert_eq!(hints.policy(), CachePolicy::All);
        assert_eq!(hints.last_requester(), None);
    }

    #[test]
    fn test_no_retention() {
        let mut hints = HintState::new();
        hints.apply(CacheOption::SetMinCapacity, 0, RequesterId::HOST).unwrap();
        hints.apply(CacheOption::SetMaxCapacity, 0, RequesterId::HOST).unwrap();
        assert_eq!(hints.effective_max(), 0);
    }

    #[test]
    fn test_merge_smallest_max_above_largest_min() {
        let mut hints = HintState::new();
        hints.apply(CacheOption::SetMaxCapacity, 20, A).unwrap();
        hints.apply(CacheOption::SetMaxCapacity, 5, B).unwrap();
        assert_eq!(hints.effective_max(), 5);

        hints.apply(CacheOption::SetMinCapacity, 8, A).unwrap();
        assert_eq!(hints.effective_min(), 8);
        assert_eq!(hints.effective_max(), 8);
        assert_eq!(hints.last_requester(), Some(A));
    }

    #[test]
    fn test_requester_updates_own_bounds() {
        let mut hints = HintState::new();
        hints.apply(CacheOption::SetMaxCapacity, 2, A).unwrap();
        hints.apply(CacheOption::SetMaxCapacity, 30, A).unwrap();
        assert_eq!(hints.effective_max(), 30);
    }

    #[test]
    fn test_policy_nothing_keeps_floor() {
        let mut hints = HintState::new();
        hints.apply(CacheOption::SetMinCapacity, 3, A).unwrap();
        hints.apply(CacheOption::SetPolicy, CachePolicy::Nothing.code(), B).unwrap();
        assert_eq!(hints.effective_max(), 3);
    }

    #[test]
    fn test_invalid_hint_leaves_state() {
        let mut hints = HintState::new();
        assert!(hints.apply(CacheOption::SetMaxCapacity, -4, A).is_err());
        assert!(hints.apply(CacheOption::SetPolicy, 9, A).is_err());
        assert!(hints.apply(CacheOption::SetAudioWindow, 100, A).is_err());
        assert_eq!(hints.effective_max(), DEFAULT_MAX_CAPACITY);
        assert_eq!(hints.last_requester(), None);
    }
}
