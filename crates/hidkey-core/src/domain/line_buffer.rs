//! Measurement line buffer.
//!
//! Instruments that emulate a keyboard "type" each reading followed by a line
//! terminator.  [`LineBuffer`] accumulates the characters of one reading and
//! emits the completed line when the terminator arrives.
//!
//! # Transition rules
//!
//! Evaluated in this order for every character:
//!
//! 1. Decimal digit, letter, or `.` → appended; nothing emitted.
//! 2. `'\r'` or `'\n'` → the buffered text is emitted and the buffer cleared.
//!    On an empty buffer the terminator is a no-op, so `CR LF` yields one
//!    measurement and a lone `CR` yields none.
//! 3. Anything else → the buffer is cleared without emitting.  Stray control
//!    keys never concatenate a partial token into a later reading.
//!
//! # Length cap
//!
//! A buffer that never sees a terminator would grow forever while the user
//! types ordinary text.  The buffer therefore holds at most `max_len`
//! characters: an accepted character that would exceed the cap discards the
//! pending token and starts a fresh one with that character.

use unicode_general_category::{get_general_category, GeneralCategory};

/// Default maximum number of characters held before a forced reset.
pub const DEFAULT_MAX_LINE_LEN: usize = 256;

/// Result of feeding one character into a [`LineBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The character was appended to the pending token.
    Accepted,
    /// A terminator closed a non-empty token.
    Completed(String),
    /// A terminator arrived while the buffer was empty.
    EmptyTerminator,
    /// A non-accepted character cleared the buffer.
    Reset {
        /// Number of pending characters that were discarded.
        discarded: usize,
    },
    /// The cap was hit; the pending token was dropped and the character
    /// started a new one.
    Overflow {
        /// Number of pending characters that were discarded.
        discarded: usize,
    },
}

impl FeedOutcome {
    /// Returns the completed line, if this outcome carries one.
    pub fn into_completed(self) -> Option<String> {
        match self {
            FeedOutcome::Completed(line) => Some(line),
            _ => None,
        }
    }
}

/// Accumulates accepted characters and emits one line per terminator.
///
/// Invariant: the buffer never contains a terminator character.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    pending: String,
    /// Number of chars in `pending` (not bytes).
    len: usize,
    max_len: usize,
}

impl LineBuffer {
    /// Creates an empty buffer with [`DEFAULT_MAX_LINE_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Creates an empty buffer holding at most `max_len` characters.
    ///
    /// A cap of zero is raised to one.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            pending: String::new(),
            len: 0,
            max_len: max_len.max(1),
        }
    }

    /// Consumes one character and returns the completed line, if any.
    pub fn feed(&mut self, ch: char) -> Option<String> {
        self.push(ch).into_completed()
    }

    /// Consumes one character and reports exactly what happened.
    pub fn push(&mut self, ch: char) -> FeedOutcome {
        if is_accepted(ch) {
            if self.len >= self.max_len {
                let discarded = self.clear();
                self.append(ch);
                return FeedOutcome::Overflow { discarded };
            }
            self.append(ch);
            return FeedOutcome::Accepted;
        }

        if is_terminator(ch) {
            if self.len == 0 {
                return FeedOutcome::EmptyTerminator;
            }
            self.len = 0;
            return FeedOutcome::Completed(std::mem::take(&mut self.pending));
        }

        let discarded = self.clear();
        FeedOutcome::Reset { discarded }
    }

    /// Discards any pending characters.
    pub fn reset(&mut self) {
        self.clear();
    }

    /// The unterminated residue currently held.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Returns `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The configured character cap.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn append(&mut self, ch: char) {
        self.pending.push(ch);
        self.len += 1;
    }

    fn clear(&mut self) -> usize {
        let discarded = self.len;
        self.pending.clear();
        self.len = 0;
        discarded
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Digits, letters, and the decimal point make up a measurement token.
///
/// Digits are decimal digits only (general category `Nd`), so `²`, `½`, and
/// Roman numerals are noise.  Letters are the `L*` categories; letter
/// numbers (`Nl`) and combining marks are noise too.
pub fn is_accepted(ch: char) -> bool {
    if ch == '.' {
        return true;
    }
    matches!(
        get_general_category(ch),
        GeneralCategory::DecimalNumber
            | GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
    )
}

/// Carriage return and line feed close a measurement.
pub fn is_terminator(ch: char) -> bool {
    ch == '\r' || ch == '\n'
}

// ── Tests ─────────────────────────────────────────────────────────────────────
