//! Role priorities and the hierarchy guard.
//!
//! Lower numbers are more privileged. A user's effective priority is the
//! minimum priority across their active assignments; a user without any
//! active assignment is unranked and outranks nobody.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use atelier_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Priority reported for callers without any active role.
pub const NO_ROLE_PRIORITY: i32 = 999;

/// Positive role priority where a lower value means more privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Priority(i32);

impl Priority {
    /// Creates a validated priority.
    pub fn new(value: i32) -> AppResult<Self> {
        if value <= 0 {
            return Err(AppError::Validation(format!(
                "role priority must be a positive integer, got {value}"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the raw priority value.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for Priority {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for i32 {
    fn from(value: Priority) -> Self {
        value.0
    }
}

impl Display for Priority {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Priority a user currently acts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "priority")]
pub enum EffectivePriority {
    /// Best priority among the user's active roles.
    Ranked(Priority),
    /// No active role; ranks below every real priority.
    Unranked,
}

impl EffectivePriority {
    /// Folds the priorities of active assignments into an effective priority.
    #[must_use]
    pub fn from_active(priorities: impl IntoIterator<Item = Priority>) -> Self {
        priorities
            .into_iter()
            .min()
            .map_or(Self::Unranked, Self::Ranked)
    }

    /// Returns the numeric value used in diagnostics.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Ranked(priority) => priority.value(),
            Self::Unranked => NO_ROLE_PRIORITY,
        }
    }

    /// Returns whether the user holds any active role.
    #[must_use]
    pub fn is_ranked(&self) -> bool {
        matches!(self, Self::Ranked(_))
    }
}

impl Ord for EffectivePriority {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Ranked(left), Self::Ranked(right)) => left.cmp(right),
            (Self::Ranked(_), Self::Unranked) => Ordering::Less,
            (Self::Unranked, Self::Ranked(_)) => Ordering::Greater,
            (Self::Unranked, Self::Unranked) => Ordering::Equal,
        }
    }
}

impl PartialOrd for EffectivePriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for EffectivePriority {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_i32())
    }
}

/// Returns whether an actor may grant or modify the target priority.
///
/// Strictly-less-than: an actor can never hand out its own level.
#[must_use]
pub fn can_grant(actor: EffectivePriority, target: Priority) -> bool {
    match actor {
        EffectivePriority::Ranked(priority) => priority < target,
        EffectivePriority::Unranked => false,
    }
}

/// Fails with [`AppError::InsufficientPrivilege`] unless [`can_grant`] holds.
pub fn ensure_can_grant(actor: EffectivePriority, target: Priority) -> AppResult<()> {
    if can_grant(actor, target) {
        return Ok(());
    }

    Err(AppError::InsufficientPrivilege {
        actor_priority: actor.as_i32(),
        target_priority: target.value(),
    })
}

#[cfg(test)]
mod tests {
    use atelier_core::AppError;
    use proptest::prelude::*;

    use super::{EffectivePriority, NO_ROLE_PRIORITY, Priority, can_grant, ensure_can_grant};

    fn priority(value: i32) -> Priority {
        match Priority::new(value) {
            Ok(priority) => priority,
            Err(error) => panic!("invalid test priority {value}: {error}"),
        }
    }

    #[test]
    fn non_positive_priority_is_rejected() {
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(-5).is_err());
    }

    #[test]
    fn effective_priority_is_minimum_of_active_roles() {
        let effective = EffectivePriority::from_active([priority(50), priority(10), priority(30)]);
        assert_eq!(effective, EffectivePriority::Ranked(priority(10)));
    }

    #[test]
    fn no_active_roles_yield_sentinel() {
        let effective = EffectivePriority::from_active(Vec::new());
        assert_eq!(effective, EffectivePriority::Unranked);
        assert_eq!(effective.as_i32(), NO_ROLE_PRIORITY);
    }

    #[test]
    fn unranked_never_grants_even_above_sentinel() {
        assert!(!can_grant(EffectivePriority::Unranked, priority(5_000)));
    }

    #[test]
    fn equal_priority_is_rejected_with_both_values() {
        let result = ensure_can_grant(EffectivePriority::Ranked(priority(40)), priority(40));
        assert!(matches!(
            result,
            Err(AppError::InsufficientPrivilege {
                actor_priority: 40,
                target_priority: 40
            })
        ));
    }

    #[test]
    fn unranked_sorts_after_every_rank() {
        assert!(EffectivePriority::Ranked(priority(i32::MAX)) < EffectivePriority::Unranked);
    }

    proptest! {
        #[test]
        fn can_grant_is_strictly_less_than(actor in 1..10_000_i32, target in 1..10_000_i32) {
            let granted = can_grant(EffectivePriority::Ranked(priority(actor)), priority(target));
            prop_assert_eq!(granted, actor < target);
        }

        #[test]
        fn actor_never_grants_own_level_or_better(actor in 1..10_000_i32, offset in 0..10_000_i32) {
            let target = (actor - offset).max(1);
            let result = ensure_can_grant(EffectivePriority::Ranked(priority(actor)), priority(target));
            prop_assert!(result.is_err());
        }
    }
}
