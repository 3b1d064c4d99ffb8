//! Windows Virtual Key (VK) code to character table for the US layout.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h).
//!
//! # What is a Windows Virtual Key (VK) code? (for beginners)
//!
//! Windows assigns each keyboard key a number called a "Virtual Key code".
//! These are defined in `<winuser.h>` and named `VK_*` (e.g., `VK_RETURN = 0x0D`,
//! `VK_DECIMAL = 0x6E`).  A VK code names a *logical* key; which character it
//! produces depends on the layout and on Shift/CapsLock.  On Windows the live
//! layout is consulted through `ToUnicode`; this module is the fixed US-layout
//! equivalent used by tests, the mock pipeline, and non-Windows builds.
//!
//! # How this table works
//!
//! `VK_TO_US_TABLE` is a compile-time constant array of 256 entries indexed by
//! VK code.  Each entry holds the unshifted and shifted character of that key,
//! or `None` when the key produces no character (arrows, function keys,
//! modifiers).  Lookup is an O(1) index, which matters because every
//! intercepted key-down goes through it.

use super::KeyTranslator;
use crate::domain::key_event::KeyboardState;

pub const VK_BACK: u8 = 0x08;
pub const VK_TAB: u8 = 0x09;
pub const VK_RETURN: u8 = 0x0D;
pub const VK_SHIFT: u8 = 0x10;
pub const VK_CONTROL: u8 = 0x11;
pub const VK_MENU: u8 = 0x12;
pub const VK_CAPITAL: u8 = 0x14;
pub const VK_ESCAPE: u8 = 0x1B;
pub const VK_SPACE: u8 = 0x20;
pub const VK_NUMPAD0: u8 = 0x60;
pub const VK_DECIMAL: u8 = 0x6E;
pub const VK_F1: u8 = 0x70;
pub const VK_LSHIFT: u8 = 0xA0;
pub const VK_RSHIFT: u8 = 0xA1;
pub const VK_LCONTROL: u8 = 0xA2;
pub const VK_RCONTROL: u8 = 0xA3;
pub const VK_LMENU: u8 = 0xA4;
pub const VK_RMENU: u8 = 0xA5;
pub const VK_OEM_PERIOD: u8 = 0xBE;

/// Characters produced by one key on the US layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyChars {
    base: char,
    shifted: char,
    /// CapsLock inverts Shift for letter keys only.
    letter: bool,
}

impl KeyChars {
    const fn symbol(base: char, shifted: char) -> Option<Self> {
        Some(Self {
            base,
            shifted,
            letter: false,
        })
    }

    const fn same(ch: char) -> Option<Self> {
        Self::symbol(ch, ch)
    }
}

/// Translator backed by the fixed US-layout table.
///
/// Honours Shift, CapsLock, and Ctrl (Ctrl+letter yields the ASCII control
/// character, as `ToUnicode` does).  Ctrl+Alt is treated as AltGr, which
/// produces nothing on the US layout.  The scan code is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsLayoutTranslator;

impl UsLayoutTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl KeyTranslator for UsLayoutTranslator {
    fn translate(
        &self,
        vk_code: u32,
        _scan_code: u32,
        keyboard_state: &KeyboardState,
    ) -> Option<char> {
        let vk = u8::try_from(vk_code).ok()?;
        let chars = VK_TO_US_TABLE[vk as usize]?;

        let ctrl = keyboard_state.is_down(VK_CONTROL)
            || keyboard_state.is_down(VK_LCONTROL)
            || keyboard_state.is_down(VK_RCONTROL);
        let alt = keyboard_state.is_down(VK_MENU)
            || keyboard_state.is_down(VK_LMENU)
            || keyboard_state.is_down(VK_RMENU);
        if ctrl && alt {
            return None;
        }

        let mut shift = keyboard_state.is_down(VK_SHIFT)
            || keyboard_state.is_down(VK_LSHIFT)
            || keyboard_state.is_down(VK_RSHIFT);
        if chars.letter && keyboard_state.is_toggled(VK_CAPITAL) {
            shift = !shift;
        }

        if ctrl {
            // Ctrl+A..Z → 0x01..0x1A; other keys produce nothing.
            return chars
                .letter
                .then(|| char::from(chars.base as u8 - b'a' + 1));
        }

        Some(if shift { chars.shifted } else { chars.base })
    }
}

/// Finds the US-layout key that types `ch`.
///
/// Returns the VK code and whether Shift must be held, or `None` if no key
/// produces `ch`.  Where two keys type the same character (digits, `.`) the
/// lower VK code wins.
pub fn us_key_for_char(ch: char) -> Option<(u8, bool)> {
    // Only used to synthesize input, never on the capture path.
    VK_TO_US_TABLE
        .iter()
        .enumerate()
        .find_map(|(vk, entry)| {
            let chars = (*entry)?;
            if chars.base == ch {
                Some((vk as u8, false))
            } else if chars.shifted == ch {
                Some((vk as u8, true))
            } else {
                None
            }
        })
}

/// Complete VK → US character mapping indexed by VK code (0x00–0xFF).
const VK_TO_US_TABLE: [Option<KeyChars>; 256] = {
    let mut t: [Option<KeyChars>; 256] = [None; 256];

    // ── Alphabet keys (VK_A=0x41 … VK_Z=0x5A) ────────────────────────────────
    let mut i = 0;
    while i < 26 {
        let lower = (b'a' + i as u8) as char;
        let upper = (b'A' + i as u8) as char;
        t[0x41 + i] = Some(KeyChars { base: lower, shifted: upper, letter: true });
        i += 1;
    }

    // ── Digit row (VK_0=0x30 … VK_9=0x39) ───────────────────────────────────
    t[0x30] = KeyChars::symbol('0', ')');
    t[0x31] = KeyChars::symbol('1', '!');
    t[0x32] = KeyChars::symbol('2', '@');
    t[0x33] = KeyChars::symbol('3', '#');
    t[0x34] = KeyChars::symbol('4', '$');
    t[0x35] = KeyChars::symbol('5', '%');
    t[0x36] = KeyChars::symbol('6', '^');
    t[0x37] = KeyChars::symbol('7', '&');
    t[0x38] = KeyChars::symbol('8', '*');
    t[0x39] = KeyChars::symbol('9', '(');

    // ── Numpad (VK_NUMPAD0=0x60 … VK_NUMPAD9=0x69) ───────────────────────────
    // Windows only reports VK_NUMPADn while NumLock is on, so no lock check.
    let mut n = 0;
    while n < 10 {
        t[0x60 + n] = KeyChars::same((b'0' + n as u8) as char);
        n += 1;
    }
    t[0x6A] = KeyChars::same('*');  // VK_MULTIPLY
    t[0x6B] = KeyChars::same('+');  // VK_ADD
    t[0x6D] = KeyChars::same('-');  // VK_SUBTRACT
    t[0x6E] = KeyChars::same('.');  // VK_DECIMAL
    t[0x6F] = KeyChars::same('/');  // VK_DIVIDE

    // ── Control keys ─────────────────────────────────────────────────────────
    t[0x08] = KeyChars::same('\u{8}');  // VK_BACK
    t[0x09] = KeyChars::same('\t');     // VK_TAB
    t[0x0D] = KeyChars::same('\r');     // VK_RETURN (main and numpad Enter)
    t[0x1B] = KeyChars::same('\u{1b}'); // VK_ESCAPE
    t[0x20] = KeyChars::same(' ');      // VK_SPACE

    // ── Punctuation / symbols ─────────────────────────────────────────────────
    t[0xBD] = KeyChars::symbol('-', '_');   // VK_OEM_MINUS
    t[0xBB] = KeyChars::symbol('=', '+');   // VK_OEM_PLUS
    t[0xDB] = KeyChars::symbol('[', '{');   // VK_OEM_4
    t[0xDD] = KeyChars::symbol(']', '}');   // VK_OEM_6
    t[0xDC] = KeyChars::symbol('\\', '|');  // VK_OEM_5
    t[0xBA] = KeyChars::symbol(';', ':');   // VK_OEM_1
    t[0xDE] = KeyChars::symbol('\'', '"');  // VK_OEM_7
    t[0xC0] = KeyChars::symbol('`', '~');   // VK_OEM_3
    t[0xBC] = KeyChars::symbol(',', '<');   // VK_OEM_COMMA
    t[0xBE] = KeyChars::symbol('.', '>');   // VK_OEM_PERIOD
    t[0xBF] = KeyChars::symbol('/', '?');   // VK_OEM_2

    t
};
