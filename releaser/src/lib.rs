//! Releaser Library
//!
//! Timestamped git releases on remote servers: discover the previous
//! release, build the new one, record its revision and promote it.

pub mod deploy;
pub mod errors;
pub mod history;
pub mod logs;
pub mod release;
pub mod remote;
pub mod settings;
pub mod shell;
pub mod utils;
