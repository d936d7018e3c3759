//! Ordered attempt chain.
//!
//! A fixed list of phases, each gated by an eligibility predicate over shared
//! state, tried in order by a [`PhaseRunner`] until one halts the chain, the
//! runner asks to stop early, or the list runs out.

use async_trait::async_trait;
use tracing::{debug, trace};

/// What a single phase did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Phase had nothing to do (e.g. no candidate provider).
    Skipped,
    /// Phase ran; move on.
    Continue,
    /// Phase produced a final answer; stop.
    Halt,
}

/// How a full run of the chain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome<P> {
    Halted(P),
    /// [`PhaseRunner::should_halt`] fired before the next phase.
    Interrupted,
    Exhausted,
}

#[async_trait]
pub trait PhaseRunner<P, S>: Send + Sync
where
    P: Send + 'static,
    S: Send,
{
    async fn attempt(&self, phase: P, state: &mut S) -> StepOutcome;

    /// Checked before every eligible phase.
    fn should_halt(&self, _state: &S) -> bool {
        false
    }
}

pub struct ChainStep<P, S> {
    pub phase: P,
    pub eligible: fn(&S) -> bool,
}

impl<P: Clone, S> Clone for ChainStep<P, S> {
    fn clone(&self) -> Self {
        Self {
            phase: self.phase.clone(),
            eligible: self.eligible,
        }
    }
}

pub struct AttemptChain<P, S> {
    steps: Vec<ChainStep<P, S>>,
}

impl<P, S> Default for AttemptChain<P, S> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<P, S> AttemptChain<P, S>
where
    P: Copy + std::fmt::Debug + Send + Sync + 'static,
    S: Send,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, phase: P, eligible: fn(&S) -> bool) -> Self {
        self.steps.push(ChainStep { phase, eligible });
        self
    }

    pub fn phases(&self) -> impl Iterator<Item = P> + '_ {
        self.steps.iter().map(|s| s.phase)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub async fn run<R>(&self, runner: &R, state: &mut S) -> ChainOutcome<P>
    where
        R: PhaseRunner<P, S> + ?Sized,
    {
        for step in &self.steps {
            if !(step.eligible)(state) {
                trace!(phase = ?step.phase, "phase not eligible");
                continue;
            }
            if runner.should_halt(state) {
                debug!(phase = ?step.phase, "attempt chain interrupted");
                return ChainOutcome::Interrupted;
            }
            match runner.attempt(step.phase, state).await {
                StepOutcome::Halt => {
                    debug!(phase = ?step.phase, "attempt chain halted");
                    return ChainOutcome::Halted(step.phase);
                }
                StepOutcome::Skipped => trace!(phase = ?step.phase, "phase skipped"),
                StepOutcome::Continue => {}
            }
        }
        ChainOutcome::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        One,
        Two,
        Three,
    }

    #[derive(Default)]
    struct Log {
        ran: Vec<Step>,
        allow_two: bool,
        halt_on: Option<Step>,
        budget: Option<usize>,
    }

    struct Recorder;

    #[async_trait]
    impl PhaseRunner<Step, Log> for Recorder {
        async fn attempt(&self, phase: Step, state: &mut Log) -> StepOutcome {
            state.ran.push(phase);
            if state.halt_on == Some(phase) {
                StepOutcome::Halt
            } else {
                StepOutcome::Continue
            }
        }

        fn should_halt(&self, state: &Log) -> bool {
            state.budget.is_some_and(|b| state.ran.len() >= b)
        }
    }

    fn chain() -> AttemptChain<Step, Log> {
        AttemptChain::new()
            .step(Step::One, |_: &Log| true)
            .step(Step::Two, |s: &Log| s.allow_two)
            .step(Step::Three, |_: &Log| true)
    }

    #[tokio::test]
    async fn runs_eligible_phases_in_order() {
        let mut log = Log::default();
        let outcome = chain().run(&Recorder, &mut log).await;
        assert_eq!(outcome, ChainOutcome::Exhausted);
        assert_eq!(log.ran, vec![Step::One, Step::Three]);
    }

    #[tokio::test]
    async fn halt_stops_the_chain() {
        let mut log = Log {
            allow_two: true,
            halt_on: Some(Step::Two),
            ..Default::default()
        };
        let outcome = chain().run(&Recorder, &mut log).await;
        assert_eq!(outcome, ChainOutcome::Halted(Step::Two));
        assert_eq!(log.ran, vec![Step::One, Step::Two]);
    }

    #[tokio::test]
    async fn should_halt_interrupts_before_next_phase() {
        let mut log = Log {
            allow_two: true,
            budget: Some(1),
            ..Default::default()
        };
        let outcome = chain().run(&Recorder, &mut log).await;
        assert_eq!(outcome, ChainOutcome::Interrupted);
        assert_eq!(log.ran, vec![Step::One]);
    }

    #[test]
    fn lists_phases() {
        let c = chain();
        assert_eq!(c.len(), 3);
        assert_eq!(c.phases().collect::<Vec<_>>(), vec![Step::One, Step::Two, Step::Three]);
    }
}
