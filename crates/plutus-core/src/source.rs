//! Credit source types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What produced a grant or a journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    /// Metered chat usage.
    Chat,
    /// Sign-up bonus.
    SignUp,
    /// Invitation bonus.
    Invitation,
    /// Campaign or activity bonus.
    Activity,
    /// Operator grant.
    System,
    /// Reserve/settle/cancel of a credit session.
    Session,
}

impl SourceType {
    /// Wire name of the source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "CHAT",
            Self::SignUp => "SIGN_UP",
            Self::Invitation => "INVITATION",
            Self::Activity => "ACTIVITY",
            Self::System => "SYSTEM",
            Self::Session => "SESSION",
        }
    }

    /// Human-readable description, used as the default journal description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Chat => "Chat Service",
            Self::SignUp => "Sign Up Bonus",
            Self::Invitation => "Invitation Bonus",
            Self::Activity => "Activity Bonus",
            Self::System => "System Grant",
            Self::Session => "Credit Session",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
