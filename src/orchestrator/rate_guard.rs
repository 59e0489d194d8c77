//! Per-conversation rate guard (§4.7): minimum inter-call spacing with
//! jitter so bursty chatter doesn't re-enter the orchestrator mid-turn.

use dashmap::DashMap;
use rand::Rng;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub struct RateGuard {
    last_call: DashMap<Uuid, Instant>,
    base_ms: u64,
    jitter_ms: u64,
}

impl RateGuard {
    pub fn new(base_ms: u64, jitter_ms: u64) -> Self {
        Self { last_call: DashMap::new(), base_ms, jitter_ms }
    }

    /// Returns `Ok(())` if this call may proceed, recording the call time.
    /// Returns `Err(retry_after_ms)` if the conversation is calling in
    /// again sooner than its jittered minimum spacing allows.
    pub fn check(&self, conversation_id: Uuid) -> Result<(), u64> {
        let now = Instant::now();
        let jitter: i64 = if self.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.jitter_ms * 2) as i64 - self.jitter_ms as i64
        };
        let required = Duration::from_millis((self.base_ms as i64 + jitter).max(0) as u64);

        if let Some(last) = self.last_call.get(&conversation_id) {
            let elapsed = now.duration_since(*last);
            if elapsed < required {
                return Err((required - elapsed).as_millis() as u64);
            }
        }
        self.last_call.insert(conversation_id, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_call_within_window_is_rejected() {
        let guard = RateGuard::new(400, 0);
        let id = Uuid::new_v4();
        assert!(guard.check(id).is_ok());
        assert!(guard.check(id).is_err());
    }

    #[test]
    fn different_conversations_do_not_interfere() {
        let guard = RateGuard::new(400, 0);
        assert!(guard.check(Uuid::new_v4()).is_ok());
        assert!(guard.check(Uuid::new_v4()).is_ok());
    }
}
