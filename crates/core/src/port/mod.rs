// Port Layer - Interfaces for external dependencies

pub mod active_job_store;
pub mod archive;
pub mod auth_prompt;
pub mod credential_store;
pub mod job_api;
pub mod time_provider;

// Re-exports
pub use active_job_store::ActiveJobStore;
pub use archive::{ArchiveAssembler, ProgressFn, SourceFile};
pub use auth_prompt::AuthPrompt;
pub use credential_store::CredentialStore;
pub use job_api::{EventStream, JobApi, SubmitParams};
pub use time_provider::TimeProvider;
