//! Common utilities for aoap-switch
//!
//! This crate provides functionality shared between the transition coordinator
//! and the command-line tool: the workspace error type, logging setup, the
//! channels that carry commands to the worker thread and outcomes back to the
//! caller, and helpers for tests.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use channel::{
    CommandReceiver, CommandSender, OutcomeReceiver, OutcomeSender, TransitionCommand,
    create_command_channel, create_outcome_channel,
};
pub use error::{Error, Result};
pub use logging::setup_logging;
