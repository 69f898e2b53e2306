// Live reveal sessions
// At most one per player; a session is dropped once its animation finishes.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};
use ulid::Ulid;

use super::reveal::{Frame, RevealAnimation};
use crate::reward::RewardEntry;

struct Session {
    player: String,
    animation: Mutex<RevealAnimation>,
}

/// Result of starting a session
#[derive(Debug, Clone, PartialEq)]
pub struct Started {
    pub session_id: Ulid,
    /// `None` when the animation had no steps and completed immediately
    pub first_frame: Option<Frame>,
}

#[derive(Default)]
pub struct SessionTracker {
    sessions: DashMap<Ulid, Session>,
    by_player: DashMap<String, Ulid>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `animation` for `player`. `None` if the player already has one running.
    pub fn begin(&self, player: &str, mut animation: RevealAnimation) -> Option<Started> {
        let session_id = Ulid::new();
        match self.by_player.entry(player.to_string()) {
            Entry::Occupied(_) => {
                debug!(player, "Reveal already running for player");
                return None;
            }
            Entry::Vacant(slot) => {
                slot.insert(session_id);
            }
        }

        let first_frame = animation.start();
        if animation.is_finished() {
            self.by_player.remove(player);
        } else {
            self.sessions.insert(
                session_id,
                Session {
                    player: player.to_string(),
                    animation: Mutex::new(animation),
                },
            );
        }

        Some(Started {
            session_id,
            first_frame,
        })
    }

    /// Advance a session. The session is forgotten once it has completed.
    pub fn tick(&self, session_id: Ulid) -> Option<Frame> {
        let (frame, finished) = {
            let session = self.sessions.get(&session_id)?;
            let mut animation = session.animation.lock();
            let frame = animation.tick();
            (frame, animation.is_finished())
        };
        if finished {
            self.forget(session_id);
        }
        frame
    }

    /// Stop the player's running reveal without completing it.
    /// Returns the reward it would have landed on, or `None` when the reveal
    /// already completed and handed the reward out itself.
    pub fn cancel_player(&self, player: &str) -> Option<RewardEntry> {
        let (_, session_id) = self.by_player.remove(player)?;
        let (_, session) = self.sessions.remove(&session_id)?;
        let mut animation = session.animation.into_inner();
        if animation.is_completed() {
            return None;
        }
        animation.stop();
        info!(player, crate_id = %animation.crate_id(), "Cancelled crate reveal");
        Some(animation.final_reward().clone())
    }

    /// Stop everything, e.g. on shutdown
    pub fn cancel_all(&self) -> usize {
        self.players()
            .iter()
            .filter(|player| self.cancel_player(player).is_some())
            .count()
    }

    /// Players with a running reveal
    pub fn players(&self) -> Vec<String> {
        self.by_player.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn session_for(&self, player: &str) -> Option<Ulid> {
        self.by_player.get(player).map(|entry| *entry.value())
    }

    pub fn is_active(&self, player: &str) -> bool {
        self.by_player.contains_key(player)
    }

    pub fn crate_of(&self, session_id: Ulid) -> Option<String> {
        self.sessions
            .get(&session_id)
            .map(|session| session.animation.lock().crate_id().to_string())
    }

    pub fn progress(&self, session_id: Ulid) -> Option<f64> {
        self.sessions
            .get(&session_id)
            .map(|session| session.animation.lock().progress())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn forget(&self, session_id: Ulid) {
        if let Some((_, session)) = self.sessions.remove(&session_id) {
            self.by_player
                .remove_if(&session.player, |_, id| *id == session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationTiming;
    use crate::crates::{CrateConfig, CrateDefinition};
    use crate::reward::RewardSelector;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn animation(seed: u64) -> RevealAnimation {
        let definition = CrateDefinition::from_config(CrateConfig::template("vote", "Vote")).unwrap();
        let timing = AnimationTiming {
            duration_ms: 0,
            base_steps: 4,
            ..AnimationTiming::default()
        };
        RevealAnimation::new(&definition, &RewardSelector::seeded(seed), timing).unwrap()
    }

    #[test]
    fn test_one_session_per_player() {
        let tracker = SessionTracker::new();
        let started = tracker.begin("alice", animation(1)).unwrap();
        assert!(started.first_frame.is_some());
        assert!(tracker.begin("alice", animation(2)).is_none());
        assert!(tracker.begin("bob", animation(3)).is_some());
        assert_eq!(tracker.session_for("alice"), Some(started.session_id));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_completed_session_is_forgotten() {
        let tracker = SessionTracker::new();
        let id = tracker.begin("alice", animation(1)).unwrap().session_id;

        let mut frames = 1;
        while let Some(frame) = tracker.tick(id) {
            frames += 1;
            if frame.is_final() {
                break;
            }
        }
        assert_eq!(frames, 4);
        assert!(!tracker.is_active("alice"));
        assert!(tracker.tick(id).is_none());
        assert!(tracker.begin("alice", animation(2)).is_some());
    }

    #[test]
    fn test_cancel_player_skips_completion() {
        let tracker = SessionTracker::new();
        let mut reveal = animation(5);
        let expected = reveal.final_reward().clone();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        reveal.on_complete(move |_| flag.store(true, Ordering::SeqCst));

        let id = tracker.begin("alice", reveal).unwrap().session_id;
        tracker.tick(id);
        assert_eq!(tracker.progress(id), Some(50.0));

        assert_eq!(tracker.cancel_player("alice"), Some(expected));
        assert!(tracker.cancel_player("alice").is_none());
        assert!(tracker.tick(id).is_none());
        assert!(!fired.load(Ordering::SeqCst));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_cancel_all() {
        let tracker = SessionTracker::new();
        tracker.begin("alice", animation(1));
        tracker.begin("bob", animation(2));
        assert_eq!(tracker.cancel_all(), 2);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_cancel_after_completion_returns_nothing() {
        let tracker = SessionTracker::new();
        let id = tracker.begin("alice", animation(6)).unwrap().session_id;

        // completed by a tick that has not yet removed the session
        {
            let session = tracker.sessions.get(&id).unwrap();
            let mut reveal = session.animation.lock();
            while reveal.tick().is_some() {}
            assert!(reveal.is_completed());
        }

        assert!(tracker.cancel_player("alice").is_none());
        assert!(tracker.is_empty());
        assert!(!tracker.is_active("alice"));
    }
}
