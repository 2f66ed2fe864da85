//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the relay business logic and persistence concerns so
//! the websocket handler can stay focused on protocol translation.

pub mod editor;
pub mod persistence;
pub mod room;
