//! Remote workflow platform access for flowwright.
//!
//! This crate provides:
//! - Wire types shared with the compiler (`WorkflowPayload`, `ConnectionMap`)
//! - The `WorkflowPlatform` trait the draft builder talks to
//! - `HttpPlatformClient`, a reqwest implementation of the public REST API

pub mod client;
pub mod config;
pub mod error;
pub mod payload;

pub use client::{HttpPlatformClient, WorkflowPlatform};
pub use config::PlatformConfig;
pub use error::PlatformError;
pub use payload::{
    ConnectionMap, ConnectionTarget, Credential, CredentialRef, Execution, ExecutionFilter,
    NodeConnections, RemoteWorkflow, WorkflowNode, WorkflowPayload, default_settings,
};
