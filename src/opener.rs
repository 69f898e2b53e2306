// Crate interaction flow
// Block use -> crate lookup -> cooldown -> key check -> draw -> reveal or grant -> key consume.
// Announcements and grant results are queued for the host to drain.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::animation::{AnimationTiming, Frame, RevealAnimation, SessionTracker};
use crate::config::CratesConfig;
use crate::crates::{CrateDefinition, CrateLocation, LocationRegistry, Mutation};
use crate::host::{InventorySink, TagReader};
use crate::keys::KeyRegistry;
use crate::reward::{summarize, RewardEntry, RewardSelector, SimulationRow};

/// Notifications for the host (chat broadcast, sounds, logs)
#[derive(Debug, Clone, PartialEq)]
pub enum CrateEvent {
    /// Announce-flagged rarity won; broadcast to everyone
    Announcement {
        player: String,
        crate_id: String,
        crate_name: String,
        reward: RewardEntry,
    },
    RewardGranted {
        player: String,
        crate_id: String,
        reward: RewardEntry,
    },
    /// A revealed reward did not fit in the player's inventory
    GrantFailed {
        player: String,
        crate_id: String,
        reward: RewardEntry,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    NotACrate,
    /// Not holding any registered crate key
    MissingKey { crate_id: String },
    /// Holding the key of another crate
    WrongKey { crate_id: String, key_crate_id: String },
    OnCooldown { crate_id: String, remaining_secs: u64 },
    /// A reveal is already running for this player
    Busy { crate_id: String },
    EmptyCrate { crate_id: String },
    /// Nothing was consumed; the player can try again
    InventoryFull { crate_id: String, reward: RewardEntry },
    Opened {
        crate_id: String,
        reward: RewardEntry,
        key_consumed: bool,
    },
    /// Reveal started; the reward is granted when it completes
    Revealing {
        crate_id: String,
        session_id: ulid::Ulid,
        first_frame: Option<Frame>,
        reward: RewardEntry,
    },
}

impl OpenOutcome {
    /// The target was a crate and the host should cancel its default block use
    pub fn handled(&self) -> bool {
        !matches!(self, OpenOutcome::NotACrate)
    }
}

#[derive(Debug)]
pub enum BreakDecision {
    NotACrate,
    /// Host must cancel the break
    Protected { crate_id: String },
    /// Break allowed; the crate location was removed
    Removed { crate_id: String, mutation: Mutation },
}

/// One use of a block by a player
pub struct OpenRequest<'a> {
    pub player: &'a str,
    pub target: &'a CrateLocation,
    pub held: Option<&'a dyn TagReader>,
    pub bypass_cooldown: bool,
    pub now: Instant,
}

impl<'a> OpenRequest<'a> {
    pub fn new(player: &'a str, target: &'a CrateLocation) -> Self {
        Self {
            player,
            target,
            held: None,
            bypass_cooldown: false,
            now: Instant::now(),
        }
    }

    pub fn holding(mut self, held: &'a dyn TagReader) -> Self {
        self.held = Some(held);
        self
    }

    pub fn bypass_cooldown(mut self) -> Self {
        self.bypass_cooldown = true;
        self
    }

    pub fn at(mut self, now: Instant) -> Self {
        self.now = now;
        self
    }
}

pub struct CrateOpener {
    registry: Arc<LocationRegistry>,
    selector: Arc<RewardSelector>,
    sink: Arc<dyn InventorySink>,
    sessions: Arc<SessionTracker>,
    config: Arc<ArcSwap<CratesConfig>>,
    /// (player, crate id) -> last successful open
    cooldowns: DashMap<(String, String), Instant>,
    events: Arc<SegQueue<CrateEvent>>,
}

impl CrateOpener {
    pub fn new(
        registry: Arc<LocationRegistry>,
        selector: Arc<RewardSelector>,
        sink: Arc<dyn InventorySink>,
        config: Arc<ArcSwap<CratesConfig>>,
    ) -> Self {
        Self {
            registry,
            selector,
            sink,
            sessions: Arc::new(SessionTracker::new()),
            config,
            cooldowns: DashMap::new(),
            events: Arc::new(SegQueue::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionTracker> {
        &self.sessions
    }

    fn keys(&self) -> &KeyRegistry {
        self.registry.keys()
    }

    /// Next queued event, oldest first
    pub fn pop_event(&self) -> Option<CrateEvent> {
        self.events.pop()
    }

    pub fn drain_events(&self) -> Vec<CrateEvent> {
        std::iter::from_fn(|| self.events.pop()).collect()
    }

    /// Crate at `target`, or directly above or below it. Some hosts report
    /// the top or bottom half of a container block.
    pub fn resolve_crate(&self, target: &CrateLocation) -> Option<CrateDefinition> {
        [0, 1, -1]
            .into_iter()
            .filter_map(|dy| target.offset_y(dy))
            .find_map(|location| self.registry.get_crate_at(&location))
    }

    pub fn cooldown_remaining(&self, player: &str, crate_id: &str, now: Instant) -> Option<Duration> {
        let seconds = self.config.load().settings.cooldown_seconds;
        if seconds == 0 {
            return None;
        }
        let last = *self
            .cooldowns
            .get(&(player.to_string(), crate_id.to_string()))?
            .value();
        let ready_at = last + Duration::from_secs(u64::from(seconds));
        ready_at.checked_duration_since(now).filter(|d| !d.is_zero())
    }

    pub fn clear_cooldowns(&self, player: &str) {
        self.cooldowns.retain(|(p, _), _| p != player);
    }

    pub fn open(&self, request: OpenRequest<'_>) -> OpenOutcome {
        let Some(definition) = self.resolve_crate(request.target) else {
            return OpenOutcome::NotACrate;
        };
        let crate_id = definition.id().to_string();
        let player = request.player;
        let config = self.config.load_full();
        info!(
            crate_id = %crate_id,
            player,
            "Crate interaction at {}",
            request.target.display_string()
        );

        if self.sessions.is_active(player) {
            return OpenOutcome::Busy { crate_id };
        }

        if !request.bypass_cooldown {
            if let Some(remaining) = self.cooldown_remaining(player, &crate_id, request.now) {
                let remaining_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                return OpenOutcome::OnCooldown {
                    crate_id,
                    remaining_secs,
                };
            }
        }

        let key_required = config.settings.require_key_in_hand;
        if key_required {
            let binding = match request.held.and_then(|held| self.keys().validate(held)) {
                Some(binding) => binding,
                None => return OpenOutcome::MissingKey { crate_id },
            };
            if !KeyRegistry::matches_crate(&binding, &crate_id) {
                return OpenOutcome::WrongKey {
                    crate_id,
                    key_crate_id: binding.crate_id,
                };
            }
        }

        let Some(reward) = self.selector.select(definition.rewards()) else {
            warn!(crate_id = %crate_id, "This crate has no rewards configured");
            return OpenOutcome::EmptyCrate { crate_id };
        };

        let consume = key_required && config.settings.consume_key_on_use;
        let announce = config.announcements.enabled;

        if config.animation.enabled {
            let timing = AnimationTiming::from(&config.animation);
            return self.reveal(&definition, player, reward, timing, consume, announce, request.now);
        }

        if !self.sink.grant(player, reward.item(), reward.amount()) {
            return OpenOutcome::InventoryFull { crate_id, reward };
        }
        let key_consumed = consume && self.consume_key(player);
        self.stamp_cooldown(player, &crate_id, request.now);
        publish_win(&self.events, player, &definition, &reward, announce);

        OpenOutcome::Opened {
            crate_id,
            reward,
            key_consumed,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn reveal(
        &self,
        definition: &CrateDefinition,
        player: &str,
        reward: RewardEntry,
        timing: AnimationTiming,
        consume: bool,
        announce: bool,
        now: Instant,
    ) -> OpenOutcome {
        let crate_id = definition.id().to_string();
        let mut animation =
            match RevealAnimation::with_final_reward(definition, &self.selector, timing, reward.clone()) {
                Ok(animation) => animation,
                Err(err) => {
                    warn!(%err, "Cannot start reveal");
                    return OpenOutcome::EmptyCrate { crate_id };
                }
            };

        // Key goes first so it cannot be reused while the reveal runs
        if consume && !self.consume_key(player) {
            return OpenOutcome::MissingKey { crate_id };
        }

        let sink = Arc::clone(&self.sink);
        let events = Arc::clone(&self.events);
        let owner = player.to_string();
        let won_from = definition.clone();
        animation.on_complete(move |won| {
            deliver(sink.as_ref(), &events, &owner, &won_from, won, announce);
        });

        self.stamp_cooldown(player, &crate_id, now);
        match self.sessions.begin(player, animation) {
            Some(started) => OpenOutcome::Revealing {
                crate_id,
                session_id: started.session_id,
                first_frame: started.first_frame,
                reward,
            },
            None => {
                deliver(self.sink.as_ref(), &self.events, player, definition, &reward, announce);
                OpenOutcome::Opened {
                    crate_id,
                    reward,
                    key_consumed: consume,
                }
            }
        }
    }

    /// Cancel a running reveal (disconnect) and hand over the reward it
    /// would have landed on, since the key is already spent.
    pub fn on_player_quit(&self, player: &str) -> Option<RewardEntry> {
        let crate_id = self
            .sessions
            .session_for(player)
            .and_then(|id| self.sessions.crate_of(id));
        let reward = self.sessions.cancel_player(player)?;
        if let Some(definition) = crate_id.and_then(|id| self.registry.get_crate(&id)) {
            let announce = self.config.load().announcements.enabled;
            deliver(self.sink.as_ref(), &self.events, player, &definition, &reward, announce);
        } else {
            warn!(player, "Reveal cancelled for a crate that no longer exists");
        }
        Some(reward)
    }

    /// Break handling for a block at `location`
    pub fn on_block_break(&self, location: &CrateLocation, is_admin: bool) -> BreakDecision {
        let Some(crate_id) = self.registry.crate_id_at(location) else {
            return BreakDecision::NotACrate;
        };
        if !is_admin && self.config.load().settings.prevent_crate_break {
            return BreakDecision::Protected { crate_id };
        }
        let mutation = self.registry.remove_location(location);
        info!(crate_id = %crate_id, "Crate block broken at {}", location.display_string());
        BreakDecision::Removed { crate_id, mutation }
    }

    /// Dry-run `iterations` draws of a crate, most frequent reward first
    pub fn simulate(&self, crate_id: &str, iterations: u32) -> Option<Vec<SimulationRow>> {
        let definition = self.registry.get_crate(crate_id)?;
        let results = self.selector.simulate(definition.rewards(), iterations);
        Some(summarize(&results, iterations))
    }

    fn consume_key(&self, player: &str) -> bool {
        let consumed = self.sink.consume_one_held_item(player);
        if !consumed {
            warn!(player, "Failed to consume crate key");
        }
        consumed
    }

    fn stamp_cooldown(&self, player: &str, crate_id: &str, now: Instant) {
        if self.config.load().settings.cooldown_seconds > 0 {
            self.cooldowns
                .insert((player.to_string(), crate_id.to_string()), now);
        }
    }
}

fn publish_win(
    events: &SegQueue<CrateEvent>,
    player: &str,
    definition: &CrateDefinition,
    reward: &RewardEntry,
    announce: bool,
) {
    info!(
        player,
        crate_id = %definition.id(),
        rarity = %reward.rarity(),
        "Gave reward {}",
        reward.display_key()
    );
    events.push(CrateEvent::RewardGranted {
        player: player.to_string(),
        crate_id: definition.id().to_string(),
        reward: reward.clone(),
    });
    if announce && reward.rarity().should_announce() {
        events.push(CrateEvent::Announcement {
            player: player.to_string(),
            crate_id: definition.id().to_string(),
            crate_name: definition.display_name().to_string(),
            reward: reward.clone(),
        });
    }
}

/// Grant a revealed reward and queue the matching events
fn deliver(
    sink: &dyn InventorySink,
    events: &SegQueue<CrateEvent>,
    player: &str,
    definition: &CrateDefinition,
    reward: &RewardEntry,
    announce: bool,
) {
    if sink.grant(player, reward.item(), reward.amount()) {
        publish_win(events, player, definition, reward, announce);
    } else {
        warn!(player, crate_id = %definition.id(), "Inventory full, reveal reward not granted");
        events.push(CrateEvent::GrantFailed {
            player: player.to_string(),
            crate_id: definition.id().to_string(),
            reward: reward.clone(),
        });
    }
}
