//! Moderator assignment for debate steps
//!
//! A [`ModeratorPool`] hands its workers out round-robin to every debate
//! step that has no moderator of its own. With an empty pool the default
//! moderator (if any) is used. Debates that still end up without one fall
//! back to their first participant when a moderator is needed.

use crate::ports::worker::Worker;
use crate::use_cases::steps::Step;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct ModeratorPool {
    pool: Vec<Arc<dyn Worker>>,
    default: Option<Arc<dyn Worker>>,
    next: usize,
}

impl ModeratorPool {
    pub fn new(pool: Vec<Arc<dyn Worker>>) -> Self {
        Self {
            pool,
            default: None,
            next: 0,
        }
    }

    /// Moderator used when the pool is empty
    pub fn with_default(mut self, moderator: Arc<dyn Worker>) -> Self {
        self.default = Some(moderator);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty() && self.default.is_none()
    }

    /// Next moderator in rotation, else the default
    pub fn next_moderator(&mut self) -> Option<Arc<dyn Worker>> {
        if self.pool.is_empty() {
            return self.default.clone();
        }
        let moderator = Arc::clone(&self.pool[self.next]);
        self.next = (self.next + 1) % self.pool.len();
        Some(moderator)
    }

    /// Fill in the moderator of every debate step that has none.
    ///
    /// Returns how many steps were assigned.
    pub fn assign(&mut self, steps: &mut [Step]) -> usize {
        let mut assigned = 0;
        let mut debates = 0;
        for step in steps.iter_mut() {
            let Step::Debate(debate) = step else {
                continue;
            };
            debates += 1;
            if debate.moderator.is_some() {
                continue;
            }
            match self.next_moderator() {
                Some(moderator) => {
                    debug!(step = %debate.name, moderator = %moderator.id(), "Moderator assigned");
                    debate.moderator = Some(moderator);
                    assigned += 1;
                }
                None => warn!(step = %debate.name, "No moderator available"),
            }
        }
        if debates > 0 {
            info!(debates, assigned, "Moderators assigned");
        }
        assigned
    }
}

impl std::fmt::Debug for ModeratorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeratorPool")
            .field("pool", &self.pool.iter().map(|w| w.id()).collect::<Vec<_>>())
            .field("default", &self.default.as_ref().map(|w| w.id()))
            .field("next", &self.next)
            .finish()
    }
}
