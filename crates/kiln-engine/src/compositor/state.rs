use crate::batch::BatchKind;

/// Where the compositor is in its frame cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RecordState {
    #[default]
    NotRecording,
    Recording {
        /// Batch receiving draws, `None` right after `begin` and after `resume`.
        active: Option<BatchKind>,
        paused: bool,
    },
}

impl RecordState {
    #[inline]
    pub fn is_recording(self) -> bool {
        matches!(self, RecordState::Recording { .. })
    }

    #[inline]
    pub fn is_paused(self) -> bool {
        matches!(self, RecordState::Recording { paused: true, .. })
    }

    #[inline]
    pub fn active(self) -> Option<BatchKind> {
        match self {
            RecordState::Recording { active, .. } => active,
            RecordState::NotRecording => None,
        }
    }
}
