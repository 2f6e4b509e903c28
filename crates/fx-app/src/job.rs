use std::fmt;

/// Everything a front-end needs to render the current job.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    Submitting,
    Polling,
    Succeeded {
        output: String,
    },
    Failed(JobFailure),
    Canceled,
}

impl ControllerState {
    /// A job is owned by the controller in these states.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Polling)
    }

    pub fn icon(&self) -> &str {
        match self {
            Self::Idle => "·",
            Self::Submitting => "📤",
            Self::Polling => "⚡",
            Self::Succeeded { .. } => "✅",
            Self::Failed(_) => "❌",
            Self::Canceled => "⏹",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Polling => "polling",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed(_) => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { output } => write!(f, "{} {}: {}", self.icon(), self.label(), output),
            Self::Failed(failure) => write!(f, "{} {}: {}", self.icon(), self.label(), failure),
            _ => write!(f, "{} {}", self.icon(), self.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Text shown to the user, keyed on where the job broke.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            FailureKind::Submission => {
                "Failed to generate image. Please check your settings and try again."
            }
            FailureKind::TimedOut => "Image generation timed out. Please try again.",
            FailureKind::Poll | FailureKind::MalformedResponse | FailureKind::JobFailed => {
                "Failed to get prediction result. Please try again."
            }
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Submission,
    Poll,
    MalformedResponse,
    JobFailed,
    TimedOut,
}

impl FailureKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Submission => "submission_failed",
            Self::Poll => "poll_failed",
            Self::MalformedResponse => "malformed_response",
            Self::JobFailed => "job_failed",
            Self::TimedOut => "timed_out",
        }
    }
}
