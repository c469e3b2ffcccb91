// SPDX-License-Identifier: MIT

//! Level-by-level execution of a dependency graph
//!
//! Nodes of one level run concurrently and are joined before the level is
//! rolled up. The first level that does not fully succeed halts execution
//! and records a [`PausePoint`] that [`ExecutionEngine::resume`] picks up.

mod dispatch;
mod executor;
mod resume;
mod result;

pub use resume::ResumeOptions;
pub use result::{ErrorInfo, ExecutionResult, ExecutionStatus, PausePoint};

use crate::weave::config::EngineSettings;
use crate::weave::invoker::{ToolCatalog, ToolInvoker};
use crate::weave::planner::Planner;
use crate::weave::registry::ToolRegistry;
use std::sync::Arc;

pub struct ExecutionEngine {
    planner: Arc<dyn Planner>,
    invoker: Arc<dyn ToolInvoker>,
    catalog: Arc<dyn ToolCatalog>,
    settings: EngineSettings,
}

impl ExecutionEngine {
    pub fn new(
        planner: Arc<dyn Planner>,
        invoker: Arc<dyn ToolInvoker>,
        catalog: Arc<dyn ToolCatalog>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            planner,
            invoker,
            catalog,
            settings,
        }
    }

    /// Engine whose registry is both the catalog and the invoker
    pub fn with_registry(
        planner: Arc<dyn Planner>,
        registry: ToolRegistry,
        settings: EngineSettings,
    ) -> Self {
        let registry = Arc::new(registry);
        Self::new(planner, registry.clone(), registry, settings)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn planner(&self) -> &Arc<dyn Planner> {
        &self.planner
    }

    pub fn catalog(&self) -> &Arc<dyn ToolCatalog> {
        &self.catalog
    }
}
