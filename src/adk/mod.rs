// SPDX-License-Identifier: MIT

//! Collaborator building blocks: errors, tools and language models

pub mod error;
pub mod model;
pub mod tool;
