pub mod registry;
pub mod workflow_runner;

pub use registry::{
    AgentRegistry, Capability, CapabilityDescriptor, ParameterKind, ParameterSpec, RegistryError,
};
pub use workflow_runner::WorkflowRunnerCapability;
