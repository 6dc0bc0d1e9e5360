//! Pointer phases and the progress kinds reported to the feedback layer.

use serde::Serialize;

/// Discrete gaze phase of a single target.
///
/// `PreEnter` and `Exit` are idle, `Enter` is transitional, `Fixation` and
/// `Dwell` accumulate toward activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointerState {
    PreEnter,
    Enter,
    Fixation,
    Dwell,
    Exit,
}

impl PointerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreEnter => "pre-enter",
            Self::Enter => "enter",
            Self::Fixation => "fixation",
            Self::Dwell => "dwell",
            Self::Exit => "exit",
        }
    }

    /// Fixation and dwell keep reporting progress on every tick.
    pub fn is_accumulating(&self) -> bool {
        matches!(self, Self::Fixation | Self::Dwell)
    }
}

/// Semantic progress notification. No payload beyond the kind itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DwellProgressState {
    Idle,
    Fixating,
    Progressing,
    Complete,
}

impl DwellProgressState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fixating => "fixating",
            Self::Progressing => "progressing",
            Self::Complete => "complete",
        }
    }
}

/// Edge mapping used when the pointer state changes.
impl From<PointerState> for DwellProgressState {
    fn from(state: PointerState) -> Self {
        match state {
            PointerState::Enter => Self::Fixating,
            PointerState::Dwell | PointerState::Fixation => Self::Progressing,
            PointerState::Exit | PointerState::PreEnter => Self::Idle,
        }
    }
}
