//! Forkline - child processes as line event streams, and programs that fork
//! themselves into master and fork roles.

pub mod config;
pub mod display;
pub mod fork;
pub mod process;
pub mod stream;
