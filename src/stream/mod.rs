//! Line streams: output line values, listeners, subscriptions and the
//! subscriber registry that fans lines out to them.

mod events;
mod line;
mod listener;
mod registry;
mod subscription;

pub use events::*;
pub use line::*;
pub use listener::*;
pub use registry::*;
pub use subscription::*;
