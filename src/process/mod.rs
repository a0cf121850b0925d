//! Child process lifecycle: spawning, state tracking and line broadcast.

mod bridge;
mod builder;
mod error;
mod os;
mod state;

pub use bridge::*;
pub use builder::*;
pub use error::*;
pub use os::*;
pub use state::*;
