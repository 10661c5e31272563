// ============================================================================
// Order Event Consumption
// ============================================================================
//
// - dispatcher/ - applies one decoded event to its order (fetch, transition, persist)
// - agent/      - the poll → decode → dispatch loop and its liveness handle
//
// ============================================================================

mod dispatcher;
mod agent;

pub use dispatcher::{Ack, DispatchError, OrderEventDispatcher};
pub use agent::{AgentHandle, BatchReport, MessageOutcome, OrderEventAgent};
