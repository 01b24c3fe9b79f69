//! In-flight counters: global, per user, per problem.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::ConcurrencyLimits;
use crate::core::ConcurrencyScope;

/// Counter state guarded as one unit so a reservation checks and bumps all
/// three counters in a single critical section.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct InFlight {
    /// All tenants.
    pub global: u32,
    /// Keyed by user id. Zero entries are removed.
    pub users: HashMap<String, u32>,
    /// Keyed by problem id. Zero entries are removed.
    pub problems: HashMap<String, u32>,
}

impl InFlight {
    /// Check ceilings in the order global, user, problem and bump all three if
    /// none is hit. Nothing changes on refusal.
    pub fn try_reserve(
        &mut self,
        limits: &ConcurrencyLimits,
        user: &str,
        problem: &str,
    ) -> Result<(), ConcurrencyScope> {
        if self.global >= limits.global_max_concurrent {
            return Err(ConcurrencyScope::Global);
        }
        if self.users.get(user).copied().unwrap_or(0) >= limits.per_user_max_concurrent {
            return Err(ConcurrencyScope::User);
        }
        if self.problems.get(problem).copied().unwrap_or(0) >= limits.per_problem_max_concurrent {
            return Err(ConcurrencyScope::Problem);
        }
        self.global += 1;
        *self.users.entry(user.to_string()).or_insert(0) += 1;
        *self.problems.entry(problem.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// Undo one reservation. Returns `false` and leaves every counter alone when
    /// any of the three has nothing to give back.
    pub fn release(&mut self, user: &str, problem: &str) -> bool {
        let user_held = self.users.get(user).copied().unwrap_or(0);
        let problem_held = self.problems.get(problem).copied().unwrap_or(0);
        if self.global == 0 || user_held == 0 || problem_held == 0 {
            return false;
        }
        self.global -= 1;
        decrement(&mut self.users, user);
        decrement(&mut self.problems, problem);
        true
    }
}

fn decrement(map: &mut HashMap<String, u32>, key: &str) {
    if let Some(count) = map.get_mut(key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            map.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ConcurrencyLimits {
        ConcurrencyLimits {
            global_max_concurrent: 3,
            per_user_max_concurrent: 2,
            per_problem_max_concurrent: 2,
        }
    }

    #[test]
    fn global_is_reported_before_user() {
        let mut state = InFlight::default();
        let tight = ConcurrencyLimits {
            global_max_concurrent: 1,
            per_user_max_concurrent: 1,
            per_problem_max_concurrent: 1,
        };
        state.try_reserve(&tight, "u", "p").unwrap();
        // Both global and user are exhausted; global wins.
        assert_eq!(state.try_reserve(&tight, "u", "p"), Err(ConcurrencyScope::Global));
    }

    #[test]
    fn user_then_problem() {
        let mut state = InFlight::default();
        state.try_reserve(&limits(), "u1", "p1").unwrap();
        state.try_reserve(&limits(), "u1", "p2").unwrap();
        assert_eq!(state.try_reserve(&limits(), "u1", "p3"), Err(ConcurrencyScope::User));
        state.try_reserve(&limits(), "u2", "p1").unwrap();
        let before = state.clone();
        // global now at 3
        assert_eq!(state.try_reserve(&limits(), "u3", "p1"), Err(ConcurrencyScope::Global));
        assert_eq!(state, before);
    }

    #[test]
    fn release_without_reservation_changes_nothing() {
        let mut state = InFlight::default();
        state.try_reserve(&limits(), "u1", "p1").unwrap();
        let before = state.clone();
        assert!(!state.release("u1", "other-problem"));
        assert!(!state.release("ghost", "p1"));
        assert_eq!(state, before);
    }

    #[test]
    fn release_drops_empty_keys() {
        let mut state = InFlight::default();
        state.try_reserve(&limits(), "u1", "p1").unwrap();
        assert!(state.release("u1", "p1"));
        assert_eq!(state, InFlight::default());
    }
}
