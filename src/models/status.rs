use serde::{Deserialize, Serialize};
use std::fmt;

/// Template lifecycle states.
///
/// The service itself delegates transition legality to the management layer;
/// this enum documents the allowed graph and is what in-memory management
/// implementations enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
    /// Initial state for newly created templates
    Draft,
    /// Template is in use for rate calculations
    Active,
    /// Template retained for history but no longer applied
    Archived,
    /// Soft-deleted template
    Deleted,
}

impl TemplateStatus {
    /// Check whether a direct transition to `next` is allowed.
    pub fn can_transition_to(&self, next: TemplateStatus) -> bool {
        match self {
            Self::Draft => matches!(next, Self::Active | Self::Archived | Self::Deleted),
            Self::Active => matches!(next, Self::Archived | Self::Deleted),
            Self::Archived => matches!(next, Self::Active | Self::Deleted),
            Self::Deleted => false,
        }
    }

    /// Terminal states allow no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TemplateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "deleted" => Ok(Self::Deleted),
            _ => Err(format!("Invalid template status: {s}")),
        }
    }
}

/// Template pricing models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Hourly,
    Daily,
    Fixed,
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::Daily => write!(f, "daily"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_is_terminal() {
        assert!(TemplateStatus::Deleted.is_terminal());
        assert!(!TemplateStatus::Deleted.can_transition_to(TemplateStatus::Active));
        assert!(!TemplateStatus::Deleted.can_transition_to(TemplateStatus::Draft));
    }

    #[test]
    fn archived_can_reactivate() {
        assert!(TemplateStatus::Archived.can_transition_to(TemplateStatus::Active));
        assert!(!TemplateStatus::Active.can_transition_to(TemplateStatus::Draft));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            TemplateStatus::Draft,
            TemplateStatus::Active,
            TemplateStatus::Archived,
            TemplateStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<TemplateStatus>().unwrap(), status);
        }
    }
}
