//! Draft sessions for incrementally building platform workflows.
//!
//! A caller starts a session, adds nodes and connects them one command at a
//! time, previews the graph, and commits it to the remote platform:
//!
//! - **Sessions**: the draft graph plus an operations log, kept in a
//!   [`SessionStore`] (in-memory or NATS key-value)
//! - **Builder**: the commands, with self-correcting errors
//! - **Preview**: read-only structural and editor-compatibility checks
//! - **Compiler**: draft or step list to the platform payload

pub mod builder;
pub mod compiler;
pub mod config;
pub mod draft;
pub mod error;
pub mod graph;
pub mod memory;
pub mod nats;
pub mod preview;
pub mod session;
pub mod store;

pub use builder::{
    AddNodeResult, CommitResult, ConnectRequest, ConnectResult, DiscardResult, DraftBuilder,
    NodeSpec, QuirkNotice,
};
pub use compiler::{CompileError, StepSpec, compile, compile_steps, draft_from_steps};
pub use config::{BuilderConfig, SessionStoreConfig, StoreBackend};
pub use draft::{DraftConnection, DraftNode, WorkflowDraft};
pub use error::{CommitFailure, DraftError, ErrorCategory, ExistingConnection, OutputIndexError};
pub use memory::InMemorySessionStore;
pub use nats::{NatsSessionStore, NatsStoreConfig};
pub use preview::{GraphSummary, PreviewIssue, PreviewReport, preview};
pub use session::{DraftSession, OperationEntry, SessionStatus};
pub use store::{SessionStore, SessionSummary, StoreError};
