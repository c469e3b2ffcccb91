// SPDX-License-Identifier: MIT

//! Request lifecycle: decompose, execute, persist, resume
//!
//! Stored runs are inspected and deleted through [`Storage`] directly.

use crate::adk::error::{Result, WeaveError};
use crate::weave::context::{ConversationContext, MemoryTurn};
use crate::weave::engine::{ExecutionEngine, ExecutionResult, ExecutionStatus, ResumeOptions};
use crate::weave::graph::DependencyGraph;
use crate::weave::storage::{RunSnapshot, Storage};
use std::sync::Arc;

/// Drives one request per run id and keeps its snapshot up to date
pub struct Coordinator {
    engine: ExecutionEngine,
    storage: Arc<dyn Storage>,
}

impl Coordinator {
    pub fn new(engine: ExecutionEngine, storage: Arc<dyn Storage>) -> Self {
        Self { engine, storage }
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Decompose `query` into a graph without executing it
    pub async fn plan(&self, query: &str) -> Result<DependencyGraph> {
        let catalog = self.engine.catalog().to_markdown().await;
        let (descriptors, usage) = self.engine.planner().decompose(query, &catalog).await?;
        let graph = DependencyGraph::build(&descriptors)?;
        graph.usage().add(usage);
        log::info!(
            "Planned run {} with {} sub-tasks",
            graph.run_id(),
            graph.len()
        );
        Ok(graph)
    }

    /// Plan and execute `query`, then save the run
    pub async fn run(&self, query: &str, mut context: ConversationContext) -> Result<ExecutionResult> {
        let mut graph = self.plan(query).await?;
        context.push(MemoryTurn::user(query));
        self.execute(&mut graph, context).await
    }

    /// Execute an already built graph from its first level and save the run
    pub async fn execute(
        &self,
        graph: &mut DependencyGraph,
        mut context: ConversationContext,
    ) -> Result<ExecutionResult> {
        let result = self.engine.execute(graph, &mut context, 0).await;
        Ok(self.persist(graph, result, &context).await)
    }

    /// Resume a stored run with the user's answer
    pub async fn resume(
        &self,
        run_id: &str,
        user_input: &str,
        options: ResumeOptions,
    ) -> Result<ExecutionResult> {
        let snapshot = self.storage.load(run_id).await?;
        let mut graph = snapshot.restore_graph()?;
        let mut context = snapshot.context.clone().unwrap_or_default();

        let result = self
            .engine
            .resume_from_pause(&mut graph, user_input, &mut context, snapshot.paused, options)
            .await?;

        if result.status == ExecutionStatus::NewDiscussion {
            // the stored run stays resumable
            return Ok(result);
        }
        Ok(self.persist(&graph, result, &context).await)
    }

    /// Save the run. A failed save turns `result` into a fault that keeps
    /// nodes, memory and the pause point.
    async fn persist(
        &self,
        graph: &DependencyGraph,
        result: ExecutionResult,
        context: &ConversationContext,
    ) -> ExecutionResult {
        let snapshot = RunSnapshot::capture(graph, result.paused, Some(context));
        let err: WeaveError = match self.storage.save(graph.run_id(), &snapshot).await {
            Ok(()) => return result,
            Err(e) => e.into(),
        };

        log::error!("Cannot save run {}: {}", graph.run_id(), err);
        let mut fault = ExecutionResult::fault(graph, context, result.levels, &err);
        fault.paused = result.paused;
        fault.help = result.help;
        fault.issue = result.issue;
        fault.interim_message = result.interim_message;
        fault.final_response = result.final_response;
        fault
    }
}
