#![allow(clippy::collapsible_else_if, clippy::collapsible_if)]
#![deny(
    clippy::get_unwrap,
    clippy::panic,
    clippy::print_stdout,
    clippy::unwrap_used
)]

pub mod actions;
pub mod agentconfig;
pub mod config;
pub mod logger;
pub mod runtime;
pub mod sandbox;
pub mod util;
