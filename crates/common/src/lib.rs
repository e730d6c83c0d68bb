//! Shared error definitions and the clock abstraction used across tryon crates.

pub mod clock;
pub mod error;

pub use {
    clock::{Clock, ManualClock, SystemClock},
    error::{Error, FromMessage, Result},
};
