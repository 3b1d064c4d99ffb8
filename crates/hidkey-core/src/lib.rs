//! # hidkey-core
//!
//! Shared library for the HidKey listener containing the keystroke domain
//! model, the measurement line buffer, and key code translation tables.
//!
//! It has zero dependencies on OS APIs, threads, or hooks; everything here
//! can be compiled and tested on any platform.
//!
//! # Architecture overview (for beginners)
//!
//! Many measurement instruments (calipers, scales, laser range finders) plug
//! in as a USB "keyboard".  When you press the instrument's send button it
//! *types* the reading, e.g. `1`, `2`, `.`, `5`, `Enter`.  The listener
//! intercepts every key press on the machine and reassembles those keystrokes
//! into one string per reading.
//!
//! This crate is the platform-independent half of that job:
//!
//! - **`domain`** – The data that flows through the pipeline: [`KeyEvent`]
//!   (one intercepted key-down), [`KeyboardState`] (the 256-entry
//!   modifier/lock snapshot), [`LineBuffer`] (the state machine that turns
//!   characters into lines), and [`Measurement`] (a completed line).
//!
//! - **`keymap`** – The [`KeyTranslator`] seam that turns a key event into a
//!   character, plus a fixed US-layout table over Windows virtual key codes.

pub mod domain;
pub mod keymap;

pub use domain::key_event::{KeyEvent, KeyboardState, KeyboardStateError};
pub use domain::line_buffer::{FeedOutcome, LineBuffer, DEFAULT_MAX_LINE_LEN};
pub use domain::measurement::{Measurement, SessionId};
pub use keymap::windows_vk::UsLayoutTranslator;
pub use keymap::KeyTranslator;
