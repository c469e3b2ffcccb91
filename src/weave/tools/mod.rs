// SPDX-License-Identifier: MIT

pub mod command;

pub use command::{create_tools, CommandTool};
