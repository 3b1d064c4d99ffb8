//! Windows low-level keyboard hook implementation.
//!
//! This module installs a `WH_KEYBOARD_LL` hook with `SetWindowsHookExW` and
//! pumps the calling thread's message queue with `PeekMessageW`.  Character
//! translation goes through `ToUnicode` so the active layout, Shift, AltGr,
//! and CapsLock are honoured.
//!
//! Low-level hook procedures receive no user pointer, so the active handler
//! lives in a thread-local slot.  The OS only calls the procedure on the
//! thread that installed the hook, which is exactly the thread owning the slot.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::cell::RefCell;
use std::ffi::c_void;
use std::panic;

use hidkey_core::keymap::windows_vk::{
    VK_CAPITAL, VK_CONTROL, VK_LCONTROL, VK_LMENU, VK_LSHIFT, VK_MENU, VK_RCONTROL, VK_RMENU,
    VK_RSHIFT, VK_SHIFT,
};
use hidkey_core::{KeyEvent, KeyTranslator, KeyboardState};
use tracing::{trace, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, GetKeyState, GetKeyboardState, ToUnicode,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, PeekMessageW, SetWindowsHookExW, TranslateMessage,
    UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, MSG, PM_REMOVE, WH_KEYBOARD_LL,
    WM_KEYDOWN, WM_QUIT,
};

use super::{HookBackend, HookError, HookHandle, KeyDownHandler};

/// `ToUnicode` flag: do not change the kernel keyboard state (Windows 10 1607+).
///
/// Without it, translating inside the hook would consume dead-key state that
/// the focused application still needs.
const TOUNICODE_NO_STATE_CHANGE: u32 = 0x4;

/// Modifier keys whose live state overrides the thread-local snapshot.
const LIVE_MODIFIERS: [u8; 9] = [
    VK_SHIFT, VK_LSHIFT, VK_RSHIFT, VK_CONTROL, VK_LCONTROL, VK_RCONTROL, VK_MENU, VK_LMENU,
    VK_RMENU,
];

thread_local! {
    /// Handler for the hook installed on this thread, if any.
    static KEY_DOWN_HANDLER: RefCell<Option<KeyDownHandler>> = const { RefCell::new(None) };
}

/// Windows low-level keyboard hook backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsHookBackend;

impl WindowsHookBackend {
    pub fn new() -> Self {
        Self
    }
}

impl HookBackend for WindowsHookBackend {
    fn install(&mut self, handler: KeyDownHandler) -> Result<HookHandle, HookError> {
        if KEY_DOWN_HANDLER.with(|slot| slot.borrow().is_some()) {
            return Err(HookError::AlreadyInstalled);
        }

        // SAFETY: a null module name returns the handle of the current executable.
        let module = unsafe { GetModuleHandleW(PCWSTR::null()) }.map_err(|e| {
            HookError::RegistrationFailed(format!("module handle unavailable: {e}"))
        })?;

        // The handler must be in place before the first callback can fire,
        // which is no earlier than the next pump on this thread.
        KEY_DOWN_HANDLER.with(|slot| *slot.borrow_mut() = Some(handler));

        // SAFETY: keyboard_hook_proc matches HOOKPROC and never unwinds; the
        // hook is bound to this thread's message queue, which pump_once drains.
        let hook = unsafe {
            SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), Some(module.into()), 0)
        };

        match hook {
            Ok(hook) => Ok(HookHandle::from_raw(hook.0 as usize)),
            Err(e) => {
                KEY_DOWN_HANDLER.with(|slot| slot.borrow_mut().take());
                Err(HookError::RegistrationFailed(e.to_string()))
            }
        }
    }

    fn uninstall(&mut self, handle: HookHandle) -> Result<(), HookError> {
        let hook = HHOOK(handle.as_raw() as *mut c_void);

        // SAFETY: the handle came from SetWindowsHookExW on this thread and is
        // consumed here, so it is released at most once.
        let result = unsafe { UnhookWindowsHookEx(hook) };

        KEY_DOWN_HANDLER.with(|slot| match slot.try_borrow_mut() {
            Ok(mut guard) => {
                guard.take();
            }
            Err(_) => warn!("key-down handler busy during uninstall; leaving slot in place"),
        });

        result.map_err(|e| HookError::UninstallFailed(e.to_string()))
    }

    fn pump_once(&mut self) -> Result<(), HookError> {
        let mut msg = MSG::default();
        // SAFETY: standard non-blocking PeekMessage/Dispatch loop on the hook thread.
        unsafe {
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    return Err(HookError::PumpFailed(
                        "WM_QUIT posted to the hook thread".to_string(),
                    ));
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        Ok(())
    }
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// Called by Windows on the installing thread while it pumps messages.  It
/// must return quickly and must always chain to the next hook; a panic must
/// never unwind into the OS.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code == HC_ACTION as i32 && w_param.0 as u32 == WM_KEYDOWN {
        // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
        let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        let (vk_code, scan_code) = (kbs.vkCode, kbs.scanCode);

        if panic::catch_unwind(|| dispatch_key_down(vk_code, scan_code)).is_err() {
            warn!(vk_code, "key-down handler panicked; event chained unchanged");
        }
    }

    // SAFETY: Forward the event to the next hook in the chain.
    CallNextHookEx(None, n_code, w_param, l_param)
}

fn dispatch_key_down(vk_code: u32, scan_code: u32) {
    let Some(keyboard_state) = read_keyboard_state() else {
        trace!(vk_code, "keyboard state unavailable; no character produced");
        return;
    };
    let event = KeyEvent::new(vk_code, scan_code, keyboard_state);

    KEY_DOWN_HANDLER.with(|slot| match slot.try_borrow_mut() {
        Ok(mut guard) => {
            if let Some(handler) = guard.as_mut() {
                handler(event);
            }
        }
        Err(_) => trace!(vk_code, "re-entrant key-down dropped"),
    });
}

/// Snapshot of the keyboard state with live modifier and CapsLock bits.
///
/// `GetKeyboardState` reflects this thread's input queue, which does not see
/// keys typed into other applications, so the modifiers are refreshed from
/// the asynchronous (hardware) state.
fn read_keyboard_state() -> Option<KeyboardState> {
    let mut bytes = [0u8; 256];
    // SAFETY: bytes is a valid 256-entry buffer.
    unsafe { GetKeyboardState(&mut bytes) }.ok()?;

    for vk in LIVE_MODIFIERS {
        // SAFETY: GetAsyncKeyState has no preconditions.
        let live = unsafe { GetAsyncKeyState(vk as i32) } as u16;
        if live & 0x8000 != 0 {
            bytes[vk as usize] |= 0x80;
        } else {
            bytes[vk as usize] &= !0x80;
        }
    }

    // SAFETY: GetKeyState has no preconditions.
    let caps = unsafe { GetKeyState(VK_CAPITAL as i32) } as u16;
    if caps & 0x0001 != 0 {
        bytes[VK_CAPITAL as usize] |= 0x01;
    } else {
        bytes[VK_CAPITAL as usize] &= !0x01;
    }

    Some(KeyboardState::from_bytes(bytes))
}

/// Layout-aware translator backed by `ToUnicode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsKeyTranslator;

impl WindowsKeyTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl KeyTranslator for WindowsKeyTranslator {
    fn translate(
        &self,
        vk_code: u32,
        scan_code: u32,
        keyboard_state: &KeyboardState,
    ) -> Option<char> {
        let mut buffer = [0u16; 4];

        // SAFETY: keyboard_state is a 256-byte array and buffer is writable.
        let written = unsafe {
            ToUnicode(
                vk_code,
                scan_code,
                Some(keyboard_state.as_bytes()),
                &mut buffer,
                TOUNICODE_NO_STATE_CHANGE,
            )
        };

        // Negative means a dead key; zero means no translation.
        if written <= 0 {
            return None;
        }
        let written = (written as usize).min(buffer.len());
        char::decode_utf16(buffer[..written].iter().copied())
            .next()?
            .ok()
    }
}
