//! Single-threaded cooperative scheduler driving analysis items to
//! completion. Modelled as explicit suspend/resume state rather than real
//! stackful fibers: a suspended item records exactly what it was waiting
//! for, and the driving loop re-enqueues it once that becomes available.

use hashbrown::HashMap;
use std::collections::VecDeque;

use crate::item::{AnalysisItemId, ItemState};
use crate::symbol::SymbolId;

/// The state a waiter needs a symbol to reach before it can make progress.
/// `Defined` only needs the symbol to exist (any discriminator but
/// `Unresolved`); `Complete` needs its owning analysis item to have
/// finished entirely (used for e.g. a struct layout query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredState {
    Defined,
    Complete,
}

/// What an item was waiting on when it suspended. Handed back to the item
/// on resume so it can pick up where the lookup left off.
#[derive(Debug, Clone, Copy)]
pub struct ResumeToken {
    pub symbol: SymbolId,
}

#[derive(Debug, Clone, Copy)]
struct Waiter {
    item: AnalysisItemId,
    symbol: SymbolId,
    required: RequiredState,
}

/// Outcome of driving one item's fiber one step.
pub enum StepOutcome {
    Complete,
    Failed,
    /// The item issued a lookup that isn't satisfiable yet; it will be
    /// re-enqueued once `symbol` reaches `required`.
    Suspend { symbol: SymbolId, required: RequiredState },
}

/// Everything the scheduler needs from the analyser it's driving, bundled
/// into one trait so `run` borrows its state exactly once instead of
/// juggling two closures that would otherwise alias the same data.
pub trait Driver {
    fn symbol_state(&self, symbol: SymbolId) -> (ItemState, bool);
    fn step(&mut self, item: AnalysisItemId) -> StepOutcome;
}

pub struct Scheduler {
    ready: VecDeque<AnalysisItemId>,
    waiting: Vec<Waiter>,
    /// Resume data handed to an item's next step after it was woken.
    pending_resume: HashMap<AnalysisItemId, ResumeToken>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { ready: VecDeque::new(), waiting: Vec::new(), pending_resume: HashMap::new() }
    }

    pub fn enqueue(&mut self, item: AnalysisItemId) {
        self.ready.push_back(item);
    }

    pub fn take_resume(&mut self, item: AnalysisItemId) -> Option<ResumeToken> {
        self.pending_resume.remove(&item)
    }

    /// Drives every ready item to completion or suspension via `driver`,
    /// waking suspended items whose symbol has reached the required state,
    /// until no item can make further progress. Returns the items still
    /// stuck when the loop stalls: a dependency cycle.
    pub fn run(&mut self, driver: &mut dyn Driver) -> Vec<AnalysisItemId> {
        loop {
            while let Some(item) = self.ready.pop_front() {
                match driver.step(item) {
                    StepOutcome::Complete | StepOutcome::Failed => {}
                    StepOutcome::Suspend { symbol, required } => {
                        self.waiting.push(Waiter { item, symbol, required });
                    }
                }
            }
            let mut woke_any = false;
            self.waiting.retain(|w| {
                let (state, is_defined) = driver.symbol_state(w.symbol);
                let satisfied = match w.required {
                    RequiredState::Defined => is_defined,
                    RequiredState::Complete => state == ItemState::Complete,
                };
                if satisfied {
                    self.pending_resume.insert(w.item, ResumeToken { symbol: w.symbol });
                    self.ready.push_back(w.item);
                    woke_any = true;
                }
                !satisfied
            });
            if !woke_any {
                break;
            }
        }
        self.waiting.iter().map(|w| w.item).collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolId;

    struct AlwaysComplete;
    impl Driver for AlwaysComplete {
        fn symbol_state(&self, _symbol: SymbolId) -> (ItemState, bool) {
            (ItemState::Complete, true)
        }
        fn step(&mut self, _item: AnalysisItemId) -> StepOutcome {
            StepOutcome::Complete
        }
    }

    #[test]
    fn ready_item_completes_without_suspending() {
        let mut sched = Scheduler::new();
        let item = AnalysisItemId(0);
        sched.enqueue(item);
        let stuck = sched.run(&mut AlwaysComplete);
        assert!(stuck.is_empty());
    }

    struct ResolvesAfterFirstStep {
        dep: SymbolId,
        resolved: bool,
        suspended_once: bool,
    }
    impl Driver for ResolvesAfterFirstStep {
        fn symbol_state(&self, _symbol: SymbolId) -> (ItemState, bool) {
            if self.resolved { (ItemState::Complete, true) } else { (ItemState::Pending, false) }
        }
        fn step(&mut self, _item: AnalysisItemId) -> StepOutcome {
            if !self.suspended_once {
                self.suspended_once = true;
                self.resolved = true;
                StepOutcome::Suspend { symbol: self.dep, required: RequiredState::Defined }
            } else {
                StepOutcome::Complete
            }
        }
    }

    #[test]
    fn suspended_item_resumes_once_symbol_resolves() {
        let mut sched = Scheduler::new();
        let item = AnalysisItemId(0);
        sched.enqueue(item);
        let mut driver = ResolvesAfterFirstStep { dep: SymbolId(7), resolved: false, suspended_once: false };
        let stuck = sched.run(&mut driver);
        assert!(stuck.is_empty());
    }

    struct NeverResolves;
    impl Driver for NeverResolves {
        fn symbol_state(&self, _symbol: SymbolId) -> (ItemState, bool) {
            (ItemState::Pending, false)
        }
        fn step(&mut self, _item: AnalysisItemId) -> StepOutcome {
            StepOutcome::Suspend { symbol: SymbolId(1), required: RequiredState::Defined }
        }
    }

    #[test]
    fn permanently_unresolvable_symbol_leaves_item_stuck() {
        let mut sched = Scheduler::new();
        let item = AnalysisItemId(0);
        sched.enqueue(item);
        let stuck = sched.run(&mut NeverResolves);
        assert_eq!(stuck, vec![item]);
    }
}
