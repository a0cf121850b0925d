//! Self-forking: run the current executable again as a child in the fork
//! role, and gate code on which role the current process plays.

mod forker;
mod handle;
mod role;

pub use forker::*;
pub use handle::*;
pub use role::*;
