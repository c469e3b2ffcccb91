// SPDX-License-Identifier: MIT

//! Task weaving: decompose a request into tool-bound sub-tasks, schedule them
//! by dependency level and execute them with pause/resume.

pub mod config;
pub mod context;
pub mod coordinator;
pub mod engine;
pub mod graph;
pub mod invoker;
pub mod node;
pub mod outcome;
pub mod planner;
pub mod registry;
pub mod rollup;
pub mod storage;
pub mod tools;
pub mod usage;
