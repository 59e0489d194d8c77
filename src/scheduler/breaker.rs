//! Per-tenant circuit breaker (§4.5): `fails` failures inside `window` trip
//! the breaker for `cooldown`; a success clears the failure history.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

struct BreakerState {
    failures: Vec<Instant>,
    opened_at: Option<Instant>,
}

pub struct CircuitBreakerRegistry {
    states: DashMap<Uuid, BreakerState>,
    fails_threshold: u32,
    window: Duration,
    cooldown: Duration,
}

impl CircuitBreakerRegistry {
    pub fn new(fails_threshold: u32, window: Duration, cooldown: Duration) -> Self {
        Self { states: DashMap::new(), fails_threshold, window, cooldown }
    }

    pub fn is_open(&self, workspace_id: Uuid) -> bool {
        match self.states.get(&workspace_id) {
            Some(state) => match state.opened_at {
                Some(opened_at) => Instant::now().duration_since(opened_at) < self.cooldown,
                None => false,
            },
            None => false,
        }
    }

    pub fn record_success(&self, workspace_id: Uuid) {
        self.states.remove(&workspace_id);
    }

    pub fn record_failure(&self, workspace_id: Uuid) {
        let now = Instant::now();
        let mut entry = self.states.entry(workspace_id).or_insert_with(|| BreakerState { failures: Vec::new(), opened_at: None });
        entry.failures.retain(|t| now.duration_since(*t) < self.window);
        entry.failures.push(now);
        if entry.failures.len() as u32 >= self.fails_threshold {
            entry.opened_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures_in_window() {
        let registry = CircuitBreakerRegistry::new(3, Duration::from_secs(60), Duration::from_secs(30));
        let workspace = Uuid::now_v7();
        assert!(!registry.is_open(workspace));
        registry.record_failure(workspace);
        registry.record_failure(workspace);
        assert!(!registry.is_open(workspace));
        registry.record_failure(workspace);
        assert!(registry.is_open(workspace));
    }

    #[test]
    fn success_clears_failure_history() {
        let registry = CircuitBreakerRegistry::new(2, Duration::from_secs(60), Duration::from_secs(30));
        let workspace = Uuid::now_v7();
        registry.record_failure(workspace);
        registry.record_success(workspace);
        registry.record_failure(workspace);
        assert!(!registry.is_open(workspace));
    }
}
