//! Intercepted key-down events.
//!
//! A [`KeyEvent`] is produced once per intercepted key-down, consumed
//! immediately by the translator, and never stored.

use thiserror::Error;

/// Number of entries in a keyboard state snapshot (one per virtual key code).
pub const KEYBOARD_STATE_LEN: usize = 256;

/// Bit set in a state entry while the key is held down.
const KEY_DOWN_BIT: u8 = 0x80;

/// Bit set in a state entry while a lock key (CapsLock, NumLock) is toggled on.
const KEY_TOGGLED_BIT: u8 = 0x01;

/// Error returned when building a [`KeyboardState`] from a raw byte slice.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyboardStateError {
    /// The slice did not contain exactly 256 entries.
    #[error("keyboard state must have {KEYBOARD_STATE_LEN} entries, got {0}")]
    WrongLength(usize),
}

/// Snapshot of the 256-entry global keyboard state taken at event time.
///
/// Each entry is indexed by virtual key code.  The high bit means "held
/// down", the low bit means "toggled on" (lock keys).  This is the layout
/// `GetKeyboardState` fills in and `ToUnicode` consumes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyboardState([u8; KEYBOARD_STATE_LEN]);

impl KeyboardState {
    /// Wraps a raw 256-byte state array.
    pub const fn from_bytes(bytes: [u8; KEYBOARD_STATE_LEN]) -> Self {
        Self(bytes)
    }

    /// A snapshot with no keys down and no locks toggled.
    pub const fn empty() -> Self {
        Self([0; KEYBOARD_STATE_LEN])
    }

    /// Returns the raw state bytes.
    pub fn as_bytes(&self) -> &[u8; KEYBOARD_STATE_LEN] {
        &self.0
    }

    /// Returns `true` when `vk` is held down.
    pub fn is_down(&self, vk: u8) -> bool {
        self.0[vk as usize] & KEY_DOWN_BIT != 0
    }

    /// Returns `true` when the lock key `vk` is toggled on.
    pub fn is_toggled(&self, vk: u8) -> bool {
        self.0[vk as usize] & KEY_TOGGLED_BIT != 0
    }

    /// Returns a copy with `vk` marked as held down.
    pub fn with_down(mut self, vk: u8) -> Self {
        self.0[vk as usize] |= KEY_DOWN_BIT;
        self
    }

    /// Returns a copy with lock key `vk` marked as toggled on.
    pub fn with_toggled(mut self, vk: u8) -> Self {
        self.0[vk as usize] |= KEY_TOGGLED_BIT;
        self
    }
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::empty()
    }
}

impl TryFrom<&[u8]> for KeyboardState {
    type Error = KeyboardStateError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; KEYBOARD_STATE_LEN] = bytes
            .try_into()
            .map_err(|_| KeyboardStateError::WrongLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl std::fmt::Debug for KeyboardState {
    // Only the active entries are interesting; 256 zeros are noise in logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active: Vec<String> = self
            .0
            .iter()
            .enumerate()
            .filter(|(_, &b)| b != 0)
            .map(|(vk, b)| format!("0x{vk:02X}={b:02X}"))
            .collect();
        f.debug_tuple("KeyboardState").field(&active).finish()
    }
}

/// One intercepted key-down event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Windows Virtual Key code.
    pub vk_code: u32,
    /// Hardware scan code.
    pub scan_code: u32,
    /// Global keyboard state read when the event was intercepted.
    pub keyboard_state: KeyboardState,
}

impl KeyEvent {
    /// Creates a key-down event.
    pub fn new(vk_code: u32, scan_code: u32, keyboard_state: KeyboardState) -> Self {
        Self {
            vk_code,
            scan_code,
            keyboard_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state_has_nothing_down_or_toggled() {
        let state = KeyboardState::empty();
        for vk in 0u8..=255 {
            assert!(!state.is_down(vk));
            assert!(!state.is_toggled(vk));
        }
    }

    #[test]
    fn test_with_down_sets_only_the_high_bit() {
        let state = KeyboardState::empty().with_down(0x10);
        assert!(state.is_down(0x10));
        assert!(!state.is_toggled(0x10));
        assert_eq!(state.as_bytes()[0x10], 0x80);
    }

    #[test]
    fn test_with_down_leaves_the_base_state_usable() {
        // Arrange
        let base = KeyboardState::empty().with_toggled(0x14);

        // Act
        let shifted = base.with_down(0x10);

        // Assert – `base` is a copy, so it is still readable and unchanged
        assert!(shifted.is_down(0x10));
        assert!(!base.is_down(0x10));
        assert_eq!(base, KeyboardState::empty().with_toggled(0x14));
    }

    #[test]
    fn test_with_toggled_sets_only_the_low_bit() {
        let state = KeyboardState::empty().with_toggled(0x14);
        assert!(state.is_toggled(0x14));
        assert!(!state.is_down(0x14));
    }

    #[test]
    fn test_try_from_slice_accepts_exactly_256_bytes() {
        let bytes = vec![0u8; 256];
        assert!(KeyboardState::try_from(bytes.as_slice()).is_ok());
    }

    #[test]
    fn test_try_from_slice_rejects_wrong_length() {
        let bytes = vec![0u8; 10];
        assert_eq!(
            KeyboardState::try_from(bytes.as_slice()),
            Err(KeyboardStateError::WrongLength(10))
        );
    }

    #[test]
    fn test_debug_lists_only_active_entries() {
        let state = KeyboardState::empty().with_down(0xA0);
        let rendered = format!("{state:?}");
        assert!(rendered.contains("0xA0=80"), "got {rendered}");
        assert!(!rendered.contains("0x00="), "got {rendered}");
    }
}
