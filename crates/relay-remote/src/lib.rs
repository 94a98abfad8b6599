//! Remote delegation for relay
//!
//! Worker units can be exposed as HTTP services ([`RemoteWorkerService`]) that
//! advertise an [`AgentCard`] at `/.well-known/agent.json`. A
//! [`DelegatingCoordinator`] discovers such services, matches subtasks to them
//! by skill and forwards the work, folding transport failures into a partial
//! result instead of aborting.

pub mod card;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod retry;
pub mod selection;
pub mod server;

pub use card::{AgentCard, AgentSkill, CARD_PATH};
pub use client::{RemoteClient, card_url};
pub use coordinator::{
    CoordinatorOutcome, DelegatingCoordinator, DelegatingCoordinatorBuilder, DispatchMode, Planner,
    Section, SectionOutcome, StaticPlan, Subtask,
};
pub use error::{RemoteError, Result};
pub use protocol::{TaskRequest, TaskResponse, TaskStatus};
pub use retry::RetryPolicy;
pub use selection::{MatchReason, RemoteEndpoint, select_endpoint};
pub use server::{RemoteWorkerService, ServiceConfig, SessionConfig, SessionStore};
