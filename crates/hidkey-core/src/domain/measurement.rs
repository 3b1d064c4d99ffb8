//! Completed measurements.

use uuid::Uuid;

/// Identifies one hook session (one install/uninstall cycle of the listener).
pub type SessionId = Uuid;

/// One completed line of instrument output.
///
/// The core does not timestamp measurements; consumers record the time of
/// receipt themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    /// The reading exactly as typed, without the terminator.
    pub text: String,
    /// Position within the emitting session, starting at 1.
    pub sequence: u64,
    /// The session that produced this reading.
    pub session_id: SessionId,
}

impl Measurement {
    pub fn new(text: impl Into<String>, sequence: u64, session_id: SessionId) -> Self {
        Self {
            text: text.into(),
            sequence,
            session_id,
        }
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_only_the_text() {
        let m = Measurement::new("12.5", 3, Uuid::new_v4());
        assert_eq!(m.to_string(), "12.5");
    }
}
