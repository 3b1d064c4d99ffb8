//! Infrastructure layer for the listener.
//!
//! Contains OS-facing adapters: the global keyboard hook backends and
//! file-system configuration storage.

pub mod input_capture;
pub mod storage;
