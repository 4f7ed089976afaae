use std::fmt;

/// Machine-readable error codes shared by the library, the simulator and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    StateFileUnreadable,
    StateFileInvalid,
    IntegrityViolation,
    LiveTreePoisoned,
    SimulationInvariantFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::StateFileUnreadable => "E2001",
            Self::StateFileInvalid => "E2002",
            Self::IntegrityViolation => "E3001",
            Self::LiveTreePoisoned => "E3002",
            Self::SimulationInvariantFailed => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::StateFileUnreadable => "State file could not be read",
            Self::StateFileInvalid => "State file is not valid JSON",
            Self::IntegrityViolation => "Edit sequence does not match the live tree",
            Self::LiveTreePoisoned => "Live tree needs a full rebuild",
            Self::SimulationInvariantFailed => "Simulation invariant violated",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .scrollback/config.toml and retry."),
            Self::StateFileUnreadable => Some("Check the path and read permissions."),
            Self::StateFileInvalid => {
                Some("Expected an object with `background`, `narrow` and `messages`.")
            }
            Self::IntegrityViolation => {
                Some("Rebuild the live tree from a full render of the current state.")
            }
            Self::LiveTreePoisoned => Some("Call `LiveTree::reset` with a full render."),
            Self::SimulationInvariantFailed => {
                Some("Replay the first failing seed with `sb sim --seed <seed>`.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 7] = [
        ErrorCode::ConfigParseError,
        ErrorCode::StateFileUnreadable,
        ErrorCode::StateFileInvalid,
        ErrorCode::IntegrityViolation,
        ErrorCode::LiveTreePoisoned,
        ErrorCode::SimulationInvariantFailed,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let text = code.code();
            assert_eq!(text.len(), 5);
            assert!(text.starts_with('E'));
            assert!(text.chars().skip(1).all(|c| c.is_ascii_digit()));
            assert_eq!(code.to_string(), text);
        }
    }

    #[test]
    fn integrity_codes_carry_hints() {
        assert!(ErrorCode::IntegrityViolation.hint().is_some());
        assert!(ErrorCode::LiveTreePoisoned.hint().is_some());
    }
}
