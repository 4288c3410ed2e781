use std::fmt::{Display, Formatter};

use crate::ErrString;

/// The category of a [`Warning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// A plan could not be executed by the native engine, so its input was materialized in
    /// memory and the remainder evaluated locally.
    EagerMaterialization,
}

/// A recoverable condition reported alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    kind: WarningKind,
    message: ErrString,
}

impl Warning {
    /// Create a new warning.
    pub fn new(kind: WarningKind, message: impl Into<ErrString>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The category of the warning.
    pub fn kind(&self) -> WarningKind {
        self.kind
    }

    /// A human readable description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "warning ({:?}): {}", self.kind, self.message)
    }
}
