//! Builders for commands and wired client stacks

mod commands;
mod stack;

pub use commands::{file_command, group_command};
pub use stack::{TestStack, test_config};
