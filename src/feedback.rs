//! Progress notification sinks.
//!
//! Sinks are fire-and-forget: whatever goes wrong while delivering an event
//! is logged here and never reaches the dwell state machine.

use log::warn;
use serde::Serialize;
use std::io::Write;

use crate::element::ElementId;
use crate::state::DwellProgressState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub element: ElementId,
    pub state: DwellProgressState,
}

pub trait ProgressSink {
    fn raise_progress(&mut self, element: ElementId, state: DwellProgressState);
}

/// Writes one JSON object per event, e.g. `{"element":3,"state":"fixating"}`.
pub struct JsonLinesSink<W: Write> {
    out: W,
    failed: bool,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressSink for JsonLinesSink<W> {
    fn raise_progress(&mut self, element: ElementId, state: DwellProgressState) {
        let evt = ProgressEvent { element, state };
        let res = serde_json::to_string(&evt)
            .map_err(std::io::Error::from)
            .and_then(|line| writeln!(self.out, "{line}"));
        if let Err(e) = res {
            // report once; a closed pipe would otherwise flood the log
            if !self.failed {
                warn!("progress sink write failed: {e}");
                self.failed = true;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Collects every raised event in order.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Vec<ProgressEvent>,
    }

    impl RecordingSink {
        pub fn states(&self) -> Vec<DwellProgressState> {
            self.events.iter().map(|e| e.state).collect()
        }

        pub fn take(&mut self) -> Vec<DwellProgressState> {
            let out = self.states();
            self.events.clear();
            out
        }
    }

    impl ProgressSink for RecordingSink {
        fn raise_progress(&mut self, element: ElementId, state: DwellProgressState) {
            self.events.push(ProgressEvent { element, state });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_format() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.raise_progress(ElementId(3), DwellProgressState::Fixating);
        sink.raise_progress(ElementId(3), DwellProgressState::Complete);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "{\"element\":3,\"state\":\"fixating\"}\n{\"element\":3,\"state\":\"complete\"}\n"
        );
    }

    #[test]
    fn test_write_errors_are_swallowed() {
        let mut sink = JsonLinesSink::new(BrokenPipe);
        sink.raise_progress(ElementId(1), DwellProgressState::Idle);
        sink.raise_progress(ElementId(1), DwellProgressState::Idle);
        assert!(sink.failed);
    }
}
