//! Optimistic like/dislike handling with explicit rollback.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Engagement, ReactionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReactionPhase {
    Idle,
    Pending,
    Confirmed,
    RolledBack,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("a reaction on this post is already pending")]
pub struct AlreadyPending;

/// Local effect of the caller reacting with `kind`, as one transition.
///
/// Repeating the held reaction removes it; switching sides moves the caller's
/// vote from one counter to the other. Flags stay mutually exclusive.
pub fn apply_reaction(current: Engagement, kind: ReactionKind) -> Engagement {
    let mut next = current;
    match kind {
        ReactionKind::Like if current.user_liked => {
            next.likes = next.likes.saturating_sub(1);
            next.user_liked = false;
        }
        ReactionKind::Like => {
            if current.user_disliked {
                next.dislikes = next.dislikes.saturating_sub(1);
            }
            next.likes += 1;
            next.user_liked = true;
            next.user_disliked = false;
        }
        ReactionKind::Dislike if current.user_disliked => {
            next.dislikes = next.dislikes.saturating_sub(1);
            next.user_disliked = false;
        }
        ReactionKind::Dislike => {
            if current.user_liked {
                next.likes = next.likes.saturating_sub(1);
            }
            next.dislikes += 1;
            next.user_disliked = true;
            next.user_liked = false;
        }
    }
    next
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    phase: ReactionPhase,
    previous: Option<Engagement>,
}

/// Per-post reaction phases for one feed instance.
#[derive(Debug, Default)]
pub struct ReactionTracker {
    entries: HashMap<String, Entry>,
}

impl ReactionTracker {
    pub fn phase(&self, id: &str) -> ReactionPhase {
        self.entries.get(id).map(|e| e.phase).unwrap_or(ReactionPhase::Idle)
    }

    /// Idle/settled -> Pending. Returns the optimistic engagement to show.
    pub fn submit(&mut self, id: &str, current: Engagement, kind: ReactionKind) -> Result<Engagement, AlreadyPending> {
        if self.phase(id) == ReactionPhase::Pending {
            return Err(AlreadyPending);
        }
        self.entries.insert(id.to_string(), Entry { phase: ReactionPhase::Pending, previous: Some(current) });
        Ok(apply_reaction(current, kind))
    }

    /// Pending -> Confirmed. Returns false if nothing was pending.
    pub fn confirm(&mut self, id: &str) -> bool {
        match self.entries.get_mut(id) {
            Some(e) if e.phase == ReactionPhase::Pending => {
                e.phase = ReactionPhase::Confirmed;
                e.previous = None;
                true
            }
            _ => false,
        }
    }

    /// Pending -> RolledBack. Yields the snapshot to restore.
    pub fn rollback(&mut self, id: &str) -> Option<Engagement> {
        match self.entries.get_mut(id) {
            Some(e) if e.phase == ReactionPhase::Pending => {
                e.phase = ReactionPhase::RolledBack;
                e.previous.take()
            }
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eng(likes: u64, dislikes: u64, liked: bool, disliked: bool) -> Engagement {
        Engagement { likes, dislikes, user_liked: liked, user_disliked: disliked, ..Default::default() }
    }

    #[test]
    fn like_over_dislike_swaps_in_one_step() {
        let next = apply_reaction(eng(3, 2, false, true), ReactionKind::Like);
        assert_eq!(next, eng(4, 1, true, false));
    }

    #[test]
    fn dislike_over_like_swaps_in_one_step() {
        let next = apply_reaction(eng(3, 2, true, false), ReactionKind::Dislike);
        assert_eq!(next, eng(2, 3, false, true));
    }

    #[test]
    fn repeating_a_reaction_removes_it() {
        assert_eq!(apply_reaction(eng(1, 0, true, false), ReactionKind::Like), eng(0, 0, false, false));
        assert_eq!(apply_reaction(eng(0, 5, false, true), ReactionKind::Dislike), eng(0, 4, false, false));
    }

    #[test]
    fn fresh_reactions_increment() {
        assert_eq!(apply_reaction(eng(0, 0, false, false), ReactionKind::Like), eng(1, 0, true, false));
        assert_eq!(apply_reaction(eng(0, 0, false, false), ReactionKind::Dislike), eng(0, 1, false, true));
    }

    #[test]
    fn counters_never_underflow() {
        // backend counts lagging behind the flag
        assert_eq!(apply_reaction(eng(0, 0, true, false), ReactionKind::Like).likes, 0);
        assert_eq!(apply_reaction(eng(0, 0, true, false), ReactionKind::Dislike).likes, 0);
    }

    #[test]
    fn flags_exclusive_for_every_transition() {
        for start in [eng(1, 1, false, false), eng(1, 1, true, false), eng(1, 1, false, true)] {
            for kind in [ReactionKind::Like, ReactionKind::Dislike] {
                let n = apply_reaction(start, kind);
                assert!(!(n.user_liked && n.user_disliked));
            }
        }
    }

    #[test]
    fn tracker_confirm_and_rollback() {
        let mut t = ReactionTracker::default();
        let before = eng(0, 0, false, false);
        let shown = t.submit("p", before, ReactionKind::Like).unwrap();
        assert_eq!(shown.likes, 1);
        assert_eq!(t.phase("p"), ReactionPhase::Pending);
        assert_eq!(t.submit("p", shown, ReactionKind::Like), Err(AlreadyPending));

        assert_eq!(t.rollback("p"), Some(before));
        assert_eq!(t.phase("p"), ReactionPhase::RolledBack);
        assert_eq!(t.rollback("p"), None);

        t.submit("p", before, ReactionKind::Dislike).unwrap();
        assert!(t.confirm("p"));
        assert_eq!(t.phase("p"), ReactionPhase::Confirmed);
        assert!(!t.confirm("p"));
    }
}
