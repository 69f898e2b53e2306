// Reveal animation state machine
// Idle -> Running -> Completed, or -> Stopped on cancellation.
// The caller drives it: start() then tick() after each frame's delay.

use tracing::info;

use super::timing::AnimationTiming;
use crate::crates::CrateDefinition;
use crate::error::AnimationError;
use crate::reward::{RewardEntry, RewardSelector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Idle,
    Running,
    Completed,
    /// Cancelled before completion; terminal
    Stopped,
}

/// What to show for one step
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Zero-based step this frame was emitted for
    pub step: u32,
    pub reward: RewardEntry,
    /// Wait before the next tick; `None` on the last frame
    pub next_delay_ms: Option<u64>,
}

impl Frame {
    pub fn is_final(&self) -> bool {
        self.next_delay_ms.is_none()
    }
}

type TickHook = Box<dyn FnMut(&RewardEntry) + Send>;
type CompleteHook = Box<dyn FnOnce(&RewardEntry) + Send>;

pub struct RevealAnimation {
    crate_id: String,
    display: Vec<RewardEntry>,
    final_reward: RewardEntry,
    timing: AnimationTiming,
    total_steps: u32,
    current_step: u32,
    state: RevealState,
    on_tick: Option<TickHook>,
    on_complete: Option<CompleteHook>,
}

impl RevealAnimation {
    /// Pre-roll the display sequence and draw the final reward
    pub fn new(
        definition: &CrateDefinition,
        selector: &RewardSelector,
        timing: AnimationTiming,
    ) -> Result<Self, AnimationError> {
        let empty = || AnimationError::EmptyRewardTable(definition.id().to_string());
        if definition.rewards().is_empty() {
            return Err(empty());
        }
        let final_reward = selector.select(definition.rewards()).ok_or_else(empty)?;
        Self::with_final_reward(definition, selector, timing, final_reward)
    }

    /// Reveal that lands on an already drawn reward
    pub fn with_final_reward(
        definition: &CrateDefinition,
        selector: &RewardSelector,
        timing: AnimationTiming,
        final_reward: RewardEntry,
    ) -> Result<Self, AnimationError> {
        let table = definition.rewards();
        if table.is_empty() {
            return Err(AnimationError::EmptyRewardTable(definition.id().to_string()));
        }

        let total_steps = timing.total_steps();
        let mut display = selector.pre_roll(table, total_steps as usize);
        match display.last_mut() {
            Some(last) => *last = final_reward.clone(),
            None => display.push(final_reward.clone()),
        }

        Ok(Self {
            crate_id: definition.id().to_string(),
            display,
            final_reward,
            timing,
            total_steps,
            current_step: 0,
            state: RevealState::Idle,
            on_tick: None,
            on_complete: None,
        })
    }

    pub fn on_tick(&mut self, hook: impl FnMut(&RewardEntry) + Send + 'static) {
        self.on_tick = Some(Box::new(hook));
    }

    pub fn on_complete(&mut self, hook: impl FnOnce(&RewardEntry) + Send + 'static) {
        self.on_complete = Some(Box::new(hook));
    }

    /// Begin and emit the first frame. Only the first call does anything.
    pub fn start(&mut self) -> Option<Frame> {
        if self.state != RevealState::Idle {
            return None;
        }
        self.state = RevealState::Running;
        self.current_step = 0;
        self.tick()
    }

    /// Advance one step. Completion fires in the same call that emits the
    /// last frame.
    pub fn tick(&mut self) -> Option<Frame> {
        if self.state != RevealState::Running {
            return None;
        }
        if self.current_step >= self.total_steps {
            self.complete();
            return None;
        }

        let step = self.current_step;
        let reward = self.display[step as usize % self.display.len()].clone();
        if let Some(hook) = self.on_tick.as_mut() {
            hook(&reward);
        }

        self.current_step += 1;
        let next_delay_ms = if self.current_step >= self.total_steps {
            self.complete();
            None
        } else {
            let delay = self.timing.delay_after(self.current_step);
            debug_log!(
                crate_id = %self.crate_id,
                step = self.current_step,
                total = self.total_steps,
                delay,
                "Animation step"
            );
            Some(delay)
        };

        Some(Frame {
            step,
            reward,
            next_delay_ms,
        })
    }

    /// Halt without completing. Later ticks do nothing.
    pub fn stop(&mut self) {
        if matches!(self.state, RevealState::Idle | RevealState::Running) {
            self.state = RevealState::Stopped;
            self.on_tick = None;
            self.on_complete = None;
        }
    }

    fn complete(&mut self) {
        if self.state == RevealState::Completed {
            return;
        }
        self.state = RevealState::Completed;
        if let Some(hook) = self.on_complete.take() {
            hook(&self.final_reward);
        }
        info!(
            crate_id = %self.crate_id,
            "Animation completed - Final reward: {}",
            self.final_reward.display_key()
        );
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RevealState::Running
    }

    pub fn is_completed(&self) -> bool {
        self.state == RevealState::Completed
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, RevealState::Completed | RevealState::Stopped)
    }

    pub fn crate_id(&self) -> &str {
        &self.crate_id
    }

    pub fn final_reward(&self) -> &RewardEntry {
        &self.final_reward
    }

    pub fn display_rewards(&self) -> &[RewardEntry] {
        &self.display
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    /// Percent of steps shown
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 100.0;
        }
        f64::from(self.current_step) / f64::from(self.total_steps) * 100.0
    }
}

impl std::fmt::Debug for RevealAnimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealAnimation")
            .field("crate_id", &self.crate_id)
            .field("state", &self.state)
            .field("current_step", &self.current_step)
            .field("total_steps", &self.total_steps)
            .finish()
    }
}
