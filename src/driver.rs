//! Per-frame dwell driver.
//!
//! Each gaze sample names the element currently under the gaze point (hit
//! testing happens upstream). The driver resets trackers on entry and exit,
//! advances elapsed time and phase, activates targets when dwell completes,
//! and asks the active tracker for feedback once per sample.

use log::{debug, error, info};
use std::collections::HashMap;
use std::time::Duration;

use crate::actions::Actuator;
use crate::config::Profile;
use crate::element::{Element, ElementId};
use crate::feedback::ProgressSink;
use crate::registry::TargetRegistry;
use crate::state::PointerState;
use crate::target::DwellTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GazeSample {
    /// Time since tracking started.
    pub timestamp: Duration,
    pub hit: Option<ElementId>,
}

impl GazeSample {
    pub fn at_ms(t_ms: u64, hit: Option<u64>) -> Self {
        Self {
            timestamp: Duration::from_millis(t_ms),
            hit: hit.map(ElementId),
        }
    }
}

pub struct DwellDriver<S: ProgressSink, A: Actuator> {
    profile: Profile,
    registry: TargetRegistry,
    elements: HashMap<ElementId, Element>,
    current: Option<ElementId>,
    sink: S,
    actuator: A,
    activations: u64,
}

impl<S: ProgressSink, A: Actuator> DwellDriver<S, A> {
    pub fn new(profile: Profile, sink: S, actuator: A) -> Self {
        Self {
            profile,
            registry: TargetRegistry::new(),
            elements: HashMap::new(),
            current: None,
            sink,
            actuator,
            activations: 0,
        }
    }

    /// Register or update an element. A kind change drops the old tracker;
    /// if the element holds the gaze it exits and is re-entered on the next
    /// sample with a fresh one.
    pub fn declare(&mut self, element: Element) {
        let kind_changed = self
            .elements
            .get(&element.id)
            .is_some_and(|prev| prev.kind != element.kind);
        if kind_changed {
            if self.current == Some(element.id) {
                self.leave_current();
            }
            self.registry.evict(element.id);
        }
        self.elements.insert(element.id, element);
    }

    /// The element left the visual tree.
    pub fn destroy(&mut self, id: ElementId) {
        self.elements.remove(&id);
        self.registry.evict(id);
        if self.current == Some(id) {
            self.current = None;
        }
    }

    /// Takes effect for each tracker on its next reset.
    pub fn set_profile(&mut self, profile: Profile) {
        self.profile = profile;
    }

    pub fn activations(&self) -> u64 {
        self.activations
    }

    pub fn tracked(&self) -> usize {
        self.registry.len()
    }

    pub fn process(&mut self, sample: GazeSample) {
        let hit = sample.hit.filter(|id| {
            let known = self.elements.contains_key(id);
            if !known {
                debug!("gaze hit undeclared element {id}; ignoring");
            }
            known
        });

        if hit != self.current {
            self.leave_current();
            if let Some(id) = hit {
                self.enter(id, sample.timestamp);
            }
            self.current = hit;
        } else if let Some(id) = hit {
            self.advance(id, sample.timestamp);
        }
    }

    fn leave_current(&mut self) {
        let Some(id) = self.current.take() else {
            return;
        };
        if let Some(target) = self.registry.get_mut(id) {
            target.state = PointerState::Exit;
            target.give_feedback(&mut self.sink);
        }
    }

    fn enter(&mut self, id: ElementId, timestamp: Duration) {
        let Some(element) = self.elements.get(&id) else {
            return;
        };
        let enter_at = self.profile.enter_delay();
        let known = self.registry.contains(id);
        let target = self.registry.get_or_create(element, &self.profile, enter_at);
        if known {
            target.reset(element, &self.profile, enter_at);
        }
        target.last_timestamp = timestamp;

        self.activations += step(target, &self.profile, &mut self.actuator);
        target.give_feedback(&mut self.sink);
    }

    fn advance(&mut self, id: ElementId, timestamp: Duration) {
        let Some(target) = self.registry.get_mut(id) else {
            return;
        };
        // out-of-order samples contribute nothing
        let delta = timestamp.saturating_sub(target.last_timestamp);
        target.accumulate(delta, self.profile.history_horizon());
        target.last_timestamp = target.last_timestamp.max(timestamp);

        self.activations += step(target, &self.profile, &mut self.actuator);
        target.give_feedback(&mut self.sink);
    }
}

/// Move through the phase boundaries the elapsed time has crossed. A slow
/// frame can cross several pre-dwell boundaries at once but activates at most
/// once; repeats it skipped over are dropped. Returns the number of activations.
fn step(target: &mut DwellTarget, profile: &Profile, actuator: &mut dyn Actuator) -> u64 {
    let mut fired = 0;
    while fired == 0
        && !target.is_exhausted()
        && target.elapsed_time() >= target.next_state_time
    {
        match target.state {
            PointerState::PreEnter => {
                target.state = PointerState::Enter;
                target.next_state_time += profile.fixation_delay();
            }
            PointerState::Enter => {
                target.state = PointerState::Fixation;
                target.next_state_time += profile.dwell_delay();
            }
            PointerState::Fixation | PointerState::Dwell => {
                target.state = PointerState::Dwell;
                activate(target, actuator);
                target.next_state_time += profile.repeat_delay();
                if target.next_state_time <= target.elapsed_time() {
                    debug!("{}: stalled frame, dropping missed repeats", target.id());
                    target.next_state_time = target.elapsed_time() + profile.repeat_delay();
                }
                fired += 1;
            }
            PointerState::Exit => break,
        }
        debug!(
            "{}: {} at {}ms, next at {}ms",
            target.id(),
            target.state.as_str(),
            target.elapsed_time().as_millis(),
            target.next_state_time.as_millis()
        );
    }
    fired
}

fn activate(target: &mut DwellTarget, actuator: &mut dyn Actuator) {
    if target.is_invokable() {
        info!(
            "{} ({}) dwell activation {}/{}",
            target.id(),
            target.kind().as_str(),
            target.repeat_count.saturating_add(1),
            target.max_dwell_repeat_count.saturating_add(1)
        );
        if let Err(e) = target.invoke(actuator) {
            error!("invoke {} failed: {e}", target.id());
        }
    } else {
        debug!("{} is not invokable; activation suppressed", target.id());
    }
    target.repeat_count = target.repeat_count.saturating_add(1);
}

#[cfg(test)]
impl<S: ProgressSink, A: Actuator> DwellDriver<S, A> {
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn current(&self) -> Option<ElementId> {
        self.current
    }

    pub fn target(&self, id: ElementId) -> Option<&DwellTarget> {
        self.registry.get(id)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use anyhow::{Result, anyhow};

    use crate::actions::Actuator;
    use crate::element::ElementId;

    /// Records every effect; optionally fails them all.
    #[derive(Debug, Default)]
    pub struct FakeActuator {
        pub invoked: Vec<(ElementId, &'static str)>,
        pub fail: bool,
    }

    impl FakeActuator {
        fn record(&mut self, id: ElementId, what: &'static str) -> Result<()> {
            self.invoked.push((id, what));
            if self.fail {
                return Err(anyhow!("device gone"));
            }
            Ok(())
        }
    }

    impl Actuator for FakeActuator {
        fn click(&mut self, id: ElementId) -> Result<()> {
            self.record(id, "click")
        }
        fn toggle(&mut self, id: ElementId) -> Result<()> {
            self.record(id, "toggle")
        }
        fn select(&mut self, id: ElementId) -> Result<()> {
            self.record(id, "select")
        }
        fn expand_collapse(&mut self, id: ElementId) -> Result<()> {
            self.record(id, "expand-collapse")
        }
    }
}
