use super::error::PipelineError;

/// Pipeline controller state machine.
///
/// State transitions:
/// ```text
/// idle → opening → live ⇄ rebuilding
///           ↓                  ↓
///         failed  ←────────────┘
/// ```
/// `failed` is left again by the next structural change (a user action).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Opening,
    Live,
    Rebuilding,
    Failed(PipelineError),
}

impl PipelineState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether a capture request is currently in flight.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Opening | Self::Rebuilding)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::Live => "live",
            Self::Rebuilding => "rebuilding",
            Self::Failed(_) => "failed",
        }
    }
}
