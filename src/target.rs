//! Per-element dwell tracking: accumulated gaze time, the current pointer
//! phase, repeat-activation bookkeeping and edge-detected progress feedback.

use anyhow::Result;
use log::debug;
use std::time::Duration;

use crate::actions::Actuator;
use crate::config::Profile;
use crate::element::{Element, ElementId, TargetKind};
use crate::feedback::ProgressSink;
use crate::state::{DwellProgressState, PointerState};

#[derive(Debug, Clone)]
pub struct DwellTarget {
    id: ElementId,
    kind: TargetKind,

    pub detailed_time: Duration,
    pub overflow_time: Duration,
    /// Elapsed time at which the next phase begins.
    pub next_state_time: Duration,
    pub last_timestamp: Duration,
    pub state: PointerState,
    pub repeat_count: u32,
    pub max_dwell_repeat_count: u32,

    // edge detection; survives reset
    notified_pointer_state: PointerState,
    notified_progress_state: DwellProgressState,
    prev_state_time: Duration,
    cached_next_state_time: Duration,
}

impl DwellTarget {
    /// A target is reset on construction, so feedback can never observe
    /// uninitialised timing.
    pub fn new(element: &Element, profile: &Profile, next_state_time: Duration) -> Self {
        let mut target = Self {
            id: element.id,
            kind: element.kind,
            detailed_time: Duration::ZERO,
            overflow_time: Duration::ZERO,
            next_state_time: Duration::ZERO,
            last_timestamp: Duration::ZERO,
            state: PointerState::PreEnter,
            repeat_count: 0,
            max_dwell_repeat_count: 0,
            notified_pointer_state: PointerState::Exit,
            notified_progress_state: DwellProgressState::Idle,
            prev_state_time: Duration::ZERO,
            cached_next_state_time: Duration::ZERO,
        };
        target.reset(element, profile, next_state_time);
        target
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn elapsed_time(&self) -> Duration {
        self.detailed_time + self.overflow_time
    }

    pub fn is_invokable(&self) -> bool {
        self.kind.is_invokable()
    }

    /// Every configured repeat has fired; no activation until the next reset.
    pub fn is_exhausted(&self) -> bool {
        self.repeat_count > self.max_dwell_repeat_count
    }

    /// Last progress kind handed to the sink.
    #[cfg(test)]
    pub fn notified_progress(&self) -> DwellProgressState {
        self.notified_progress_state
    }

    /// Restart tracking. The repeat limit is re-read so configuration edits
    /// apply from the next gaze entry on.
    pub fn reset(&mut self, element: &Element, profile: &Profile, next_state_time: Duration) {
        self.state = PointerState::PreEnter;
        self.detailed_time = Duration::ZERO;
        self.overflow_time = Duration::ZERO;
        self.next_state_time = next_state_time;
        self.repeat_count = 0;
        self.max_dwell_repeat_count = profile.max_dwell_repeat_count(element);
    }

    /// Add gaze time, keeping at most `horizon` in the detailed portion.
    pub fn accumulate(&mut self, delta: Duration, horizon: Duration) {
        self.detailed_time += delta;
        if self.detailed_time > horizon {
            self.overflow_time += self.detailed_time - horizon;
            self.detailed_time = horizon;
        }
    }

    /// Fill level of the current phase window in `[0, 1]`.
    pub fn progress_fraction(&self) -> f64 {
        let window = self
            .cached_next_state_time
            .saturating_sub(self.prev_state_time);
        if window.is_zero() {
            return 0.0;
        }
        let done = self.elapsed_time().saturating_sub(self.prev_state_time);
        (done.as_secs_f64() / window.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Report the current phase. Idle and transitional phases notify once on
    /// entry; fixation and dwell notify on every call.
    pub fn give_feedback(&mut self, sink: &mut dyn ProgressSink) {
        if self.cached_next_state_time != self.next_state_time {
            self.prev_state_time = self.cached_next_state_time;
            self.cached_next_state_time = self.next_state_time;
        }

        if self.state != self.notified_pointer_state {
            self.raise_progress(sink, DwellProgressState::from(self.state));
            self.notified_pointer_state = self.state;
        } else if self.state.is_accumulating() {
            if self.repeat_count <= self.max_dwell_repeat_count {
                self.raise_progress(sink, DwellProgressState::Progressing);
            } else {
                self.raise_progress(sink, DwellProgressState::Complete);
            }
        }
    }

    fn raise_progress(&mut self, sink: &mut dyn ProgressSink, state: DwellProgressState) {
        if state != self.notified_progress_state {
            debug!(
                "{}: {} -> {} ({:.0}%)",
                self.id,
                self.notified_progress_state.as_str(),
                state.as_str(),
                self.progress_fraction() * 100.0
            );
            self.notified_progress_state = state;
        }
        sink.raise_progress(self.id, state);
    }

    pub fn invoke(&self, actuator: &mut dyn Actuator) -> Result<()> {
        self.kind.invoke(self.id, actuator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::testing::RecordingSink;
    use crate::state::DwellProgressState::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn make_target(max_repeat: u32) -> (DwellTarget, Element, Profile) {
        let element = Element::new(1, TargetKind::Button).with_max_repeat(max_repeat);
        let profile = Profile::default();
        let target = DwellTarget::new(&element, &profile, ms(0));
        (target, element, profile)
    }

    #[test]
    fn test_elapsed_is_sum_of_parts() {
        let (mut t, _, _) = make_target(0);
        assert_eq!(t.elapsed_time(), Duration::ZERO);

        t.detailed_time = ms(120);
        assert_eq!(t.elapsed_time(), ms(120));
        t.overflow_time = ms(30);
        assert_eq!(t.elapsed_time(), ms(150));

        t.accumulate(ms(500), ms(400));
        assert_eq!(t.detailed_time, ms(400));
        assert_eq!(t.overflow_time, ms(250));
        assert_eq!(t.elapsed_time(), ms(650));
    }

    #[test]
    fn test_reset_clears_timing_and_state() {
        let (mut t, element, profile) = make_target(3);
        t.state = PointerState::Dwell;
        t.detailed_time = ms(800);
        t.overflow_time = ms(200);
        t.repeat_count = 4;

        t.reset(&element, &profile, ms(75));
        assert_eq!(t.state, PointerState::PreEnter);
        assert_eq!(t.detailed_time, Duration::ZERO);
        assert_eq!(t.overflow_time, Duration::ZERO);
        assert_eq!(t.repeat_count, 0);
        assert_eq!(t.next_state_time, ms(75));
        assert_eq!(t.max_dwell_repeat_count, 3);
    }

    #[test]
    fn test_reset_rereads_repeat_limit() {
        let (mut t, element, profile) = make_target(1);
        let changed = element.clone().with_max_repeat(4);
        assert_eq!(t.max_dwell_repeat_count, 1);
        t.reset(&changed, &profile, ms(0));
        assert_eq!(t.max_dwell_repeat_count, 4);
    }

    #[test]
    fn test_single_edge_notification() {
        let (mut t, _, _) = make_target(0);
        let mut sink = RecordingSink::default();
        for state in [
            PointerState::PreEnter,
            PointerState::PreEnter,
            PointerState::Enter,
            PointerState::Enter,
            PointerState::Dwell,
        ] {
            t.state = state;
            t.give_feedback(&mut sink);
        }
        assert_eq!(sink.states(), vec![Idle, Fixating, Progressing]);
    }

    #[test]
    fn test_accumulating_phases_notify_every_tick() {
        let (mut t, _, _) = make_target(0);
        let mut sink = RecordingSink::default();
        t.state = PointerState::Fixation;
        for _ in 0..3 {
            t.give_feedback(&mut sink);
        }
        assert_eq!(sink.states(), vec![Progressing, Progressing, Progressing]);
    }

    #[test]
    fn test_repeat_threshold() {
        let (mut t, _, _) = make_target(2);
        let mut sink = RecordingSink::default();
        t.state = PointerState::Dwell;
        for count in 0..=3 {
            t.repeat_count = count;
            t.give_feedback(&mut sink);
        }
        assert_eq!(sink.states(), vec![Progressing, Progressing, Progressing, Complete]);
    }

    #[test]
    fn test_exit_notifies_once() {
        let (mut t, _, _) = make_target(0);
        let mut sink = RecordingSink::default();
        t.state = PointerState::Dwell;
        t.give_feedback(&mut sink);
        sink.take();

        t.state = PointerState::Exit;
        for _ in 0..4 {
            t.give_feedback(&mut sink);
        }
        assert_eq!(sink.states(), vec![Idle]);
    }

    #[test]
    fn test_reset_keeps_edge_basis() {
        let (mut t, element, profile) = make_target(0);
        let mut sink = RecordingSink::default();
        t.state = PointerState::Dwell;
        t.give_feedback(&mut sink);
        sink.take();

        t.reset(&element, &profile, ms(50));
        t.give_feedback(&mut sink);
        t.give_feedback(&mut sink);
        assert_eq!(sink.states(), vec![Idle]);
    }

    #[test]
    fn test_enter_dwell_complete_scenario() {
        let (mut t, _, _) = make_target(0);
        let mut sink = RecordingSink::default();

        t.state = PointerState::Enter;
        t.last_timestamp = ms(50);
        t.give_feedback(&mut sink);
        assert_eq!(sink.take(), vec![Fixating]);

        t.state = PointerState::Dwell;
        t.detailed_time = ms(400);
        t.last_timestamp = ms(450);
        t.give_feedback(&mut sink);
        assert_eq!(sink.take(), vec![Progressing]);

        t.repeat_count = 1;
        t.give_feedback(&mut sink);
        assert_eq!(sink.take(), vec![Complete]);
        assert!(t.is_exhausted());
        assert_eq!(t.notified_progress(), Complete);
    }

    #[test]
    fn test_progress_fraction_tracks_window() {
        let (mut t, _, _) = make_target(0);
        let mut sink = RecordingSink::default();

        t.next_state_time = ms(100);
        t.give_feedback(&mut sink);
        t.next_state_time = ms(500);
        t.give_feedback(&mut sink);

        t.detailed_time = ms(300);
        assert!((t.progress_fraction() - 0.5).abs() < 1e-9);
        t.detailed_time = ms(900);
        assert_eq!(t.progress_fraction(), 1.0);
        t.detailed_time = ms(50);
        assert_eq!(t.progress_fraction(), 0.0);
    }

    #[test]
    fn test_progress_fraction_empty_window() {
        let (t, _, _) = make_target(0);
        assert_eq!(t.progress_fraction(), 0.0);
    }
}
