use async_trait::async_trait;

use crate::agent::LoopResult;
use crate::message::Observation;
use crate::parser::Action;

/// Observer of a run's progress. Every method defaults to a no-op; hooks
/// cannot alter or fail the run.
#[async_trait]
pub trait AgentHook: Send + Sync {
    async fn on_step(&self, _step: usize, _max_steps: usize) {}

    async fn after_model(&self, _raw_response: &str) {}

    async fn before_tool_call(&self, _action: &Action) {}

    async fn on_observation(&self, _observation: &Observation) {}

    async fn on_finish(&self, _result: &LoopResult) {}
}
