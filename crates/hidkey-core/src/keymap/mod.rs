//! Key code to character translation.
//!
//! Every intercepted key-down goes through a [`KeyTranslator`] before it
//! reaches the line buffer.  The production translator on Windows delegates
//! to the OS (`ToUnicode`) so the active keyboard layout and Shift/AltGr
//! state are honoured; [`windows_vk::UsLayoutTranslator`] is a fixed table
//! over Windows virtual key codes usable on any platform.

use std::sync::Arc;

use crate::domain::key_event::{KeyEvent, KeyboardState};

pub mod windows_vk;

/// Converts a virtual key code into a printable character.
///
/// Implementations must treat every failure (unreadable state, unmapped key,
/// failing OS call) as "no character" and return `None`.  Translation runs
/// inside the global input path, so it must never panic or block.
pub trait KeyTranslator: Send + Sync {
    /// Translates `vk_code`/`scan_code` under `keyboard_state`.
    fn translate(
        &self,
        vk_code: u32,
        scan_code: u32,
        keyboard_state: &KeyboardState,
    ) -> Option<char>;

    /// Translates a whole [`KeyEvent`].
    fn translate_event(&self, event: &KeyEvent) -> Option<char> {
        self.translate(event.vk_code, event.scan_code, &event.keyboard_state)
    }
}

impl<T: KeyTranslator + ?Sized> KeyTranslator for Arc<T> {
    fn translate(
        &self,
        vk_code: u32,
        scan_code: u32,
        keyboard_state: &KeyboardState,
    ) -> Option<char> {
        (**self).translate(vk_code, scan_code, keyboard_state)
    }
}

impl<T: KeyTranslator + ?Sized> KeyTranslator for Box<T> {
    fn translate(
        &self,
        vk_code: u32,
        scan_code: u32,
        keyboard_state: &KeyboardState,
    ) -> Option<char> {
        (**self).translate(vk_code, scan_code, keyboard_state)
    }
}
