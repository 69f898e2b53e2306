// Slot-machine style reveal of a drawn reward

mod reveal;
mod sessions;
mod timing;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::host::Scheduler;

pub use reveal::{Frame, RevealAnimation, RevealState};
pub use sessions::{SessionTracker, Started};
pub use timing::{ease_out_cubic, AnimationTiming};

/// Start `animation` and keep re-scheduling ticks on `scheduler` using each
/// frame's delay until the last frame. Stopping the animation ends the chain.
pub fn drive(animation: Arc<Mutex<RevealAnimation>>, scheduler: Arc<dyn Scheduler + Send + Sync>) {
    let frame = animation.lock().start();
    schedule_next(animation, scheduler, frame);
}

fn schedule_next(
    animation: Arc<Mutex<RevealAnimation>>,
    scheduler: Arc<dyn Scheduler + Send + Sync>,
    frame: Option<Frame>,
) {
    let Some(delay) = frame.and_then(|f| f.next_delay_ms) else {
        return;
    };
    let next = Arc::clone(&scheduler);
    scheduler.schedule_after(
        delay,
        Box::new(move || {
            let frame = animation.lock().tick();
            schedule_next(animation, next, frame);
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crates::{CrateConfig, CrateDefinition};
    use crate::reward::{RewardEntry, RewardSelector};
    use std::collections::VecDeque;

    type Job = Box<dyn FnOnce() + Send>;

    /// Queues callbacks and runs them on demand, recording delays
    #[derive(Default)]
    struct ManualScheduler {
        queue: Mutex<VecDeque<(u64, Job)>>,
        delays: Mutex<Vec<u64>>,
    }

    impl Scheduler for ManualScheduler {
        fn schedule_after(&self, delay_ms: u64, callback: Job) {
            self.delays.lock().push(delay_ms);
            self.queue.lock().push_back((delay_ms, callback));
        }
    }

    impl ManualScheduler {
        fn run_next(&self) -> bool {
            let job = self.queue.lock().pop_front();
            match job {
                Some((_, callback)) => {
                    callback();
                    true
                }
                None => false,
            }
        }
    }

    fn animation() -> RevealAnimation {
        let definition = CrateDefinition::from_config(CrateConfig::template("vote", "Vote")).unwrap();
        RevealAnimation::new(&definition, &RewardSelector::seeded(9), AnimationTiming::default()).unwrap()
    }

    #[test]
    fn test_scheduler_drives_to_completion() {
        let mut reveal = animation();
        let won: Arc<Mutex<Option<RewardEntry>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&won);
        reveal.on_complete(move |reward| *slot.lock() = Some(reward.clone()));
        let expected = reveal.final_reward().clone();

        let reveal = Arc::new(Mutex::new(reveal));
        let scheduler = Arc::new(ManualScheduler::default());
        drive(Arc::clone(&reveal), scheduler.clone());

        let mut runs = 0;
        while scheduler.run_next() {
            runs += 1;
        }
        assert_eq!(runs, 69);
        assert!(reveal.lock().is_completed());
        assert_eq!(won.lock().as_ref(), Some(&expected));

        let delays = scheduler.delays.lock();
        assert_eq!(delays.len(), 69);
        assert!(delays.first().unwrap() < delays.last().unwrap());
    }

    #[test]
    fn test_stopped_animation_ends_chain() {
        let reveal = Arc::new(Mutex::new(animation()));
        let scheduler = Arc::new(ManualScheduler::default());
        drive(Arc::clone(&reveal), scheduler.clone());

        assert!(scheduler.run_next());
        reveal.lock().stop();
        assert!(scheduler.run_next());
        assert!(!scheduler.run_next());
        assert_eq!(reveal.lock().current_step(), 2);
    }
}
