//! Core types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible mailbox state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailboxState {
    /// Distance near baseline
    #[default]
    Empty,
    /// Stable occlusion below the trigger threshold
    HasMail,
    /// Occlusion below the full threshold
    Full,
    /// Mail was just collected; settles back to `Empty`
    Emptied,
}

impl MailboxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailboxState::Empty => "empty",
            MailboxState::HasMail => "has_mail",
            MailboxState::Full => "full",
            MailboxState::Emptied => "emptied",
        }
    }

    /// True while something is believed to be inside the box.
    pub fn holds_mail(&self) -> bool {
        matches!(self, MailboxState::HasMail | MailboxState::Full)
    }
}

impl fmt::Display for MailboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        assert_eq!(MailboxState::default(), MailboxState::Empty);
        assert_eq!(MailboxState::HasMail.to_string(), "has_mail");
        assert_eq!(
            serde_json::to_string(&MailboxState::Emptied).unwrap(),
            "\"emptied\""
        );
        assert!(MailboxState::Full.holds_mail());
        assert!(!MailboxState::Emptied.holds_mail());
    }
}
