//! Release types with a phase state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::resource::{Spec, State};

/// One versioned record of an apply, destroy or rollback attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub project: String,

    pub workspace: String,

    /// Revision number (1-indexed, allocated per project and workspace)
    pub revision: u64,

    pub stack: String,

    /// Desired resources; attached by the generator layer for apply releases
    #[serde(default)]
    pub spec: Option<Spec>,

    /// Resources existing when this release was started
    #[serde(default)]
    pub state: Option<State>,

    pub phase: ReleasePhase,

    pub create_time: DateTime<Utc>,

    pub modified_time: DateTime<Utc>,
}

impl Release {
    /// Create a release in the `Generating` phase, stamped now
    pub fn new(
        project: impl Into<String>,
        workspace: impl Into<String>,
        stack: impl Into<String>,
        revision: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            project: project.into(),
            workspace: workspace.into(),
            revision,
            stack: stack.into(),
            spec: None,
            state: None,
            phase: ReleasePhase::Generating,
            create_time: now,
            modified_time: now,
        }
    }

    /// Whether this release is still being worked on
    pub fn is_in_flight(&self) -> bool {
        !self.phase.is_terminal()
    }

    /// Advance the phase, enforcing the state machine
    pub fn set_phase(&mut self, phase: ReleasePhase) -> Result<()> {
        if !self.phase.can_transition_to(phase) {
            return Err(CoreError::InvalidPhaseTransition {
                from: self.phase,
                to: phase,
            });
        }
        self.phase = phase;
        self.touch();
        Ok(())
    }

    /// Stamp the modification time
    pub fn touch(&mut self) {
        self.modified_time = Utc::now();
    }
}

/// Phase of a release
///
/// `Generating`, `Previewing`, `Applying` and `Destroying` are in-flight;
/// `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReleasePhase {
    Generating,
    Previewing,
    Applying,
    Destroying,
    Succeeded,
    Failed,
}

impl ReleasePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether a release in this phase may move to `next`
    pub fn can_transition_to(&self, next: ReleasePhase) -> bool {
        use ReleasePhase::*;
        match self {
            Generating => matches!(next, Previewing | Failed),
            Previewing => matches!(next, Applying | Destroying | Succeeded | Failed),
            Applying | Destroying => matches!(next, Succeeded | Failed),
            Succeeded | Failed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generating => "Generating",
            Self::Previewing => "Previewing",
            Self::Applying => "Applying",
            Self::Destroying => "Destroying",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReleasePhase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(CoreError::EmptyPhase),
            "Generating" => Ok(Self::Generating),
            "Previewing" => Ok(Self::Previewing),
            "Applying" => Ok(Self::Applying),
            "Destroying" => Ok(Self::Destroying),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownPhase(other.to_string())),
        }
    }
}

impl TryFrom<String> for ReleasePhase {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ReleasePhase> for String {
    fn from(phase: ReleasePhase) -> Self {
        phase.as_str().to_string()
    }
}
