pub mod error;
pub mod events;
pub mod handlers;
pub mod introduction;
pub mod job_analyzer;
pub mod orchestrator;
pub mod prompts;
pub mod role_refiner;
pub mod section;
pub mod sse;

use std::sync::Arc;
use std::time::Duration;

use crate::credentials::CredentialCipher;
use crate::llm_client::ModelFactory;

/// Everything a refinement run needs besides the request itself.
#[derive(Clone)]
pub struct RefinementContext {
    pub models: Arc<dyn ModelFactory>,
    pub cipher: Arc<CredentialCipher>,
    /// Upper bound on concurrently refined roles.
    pub max_concurrency: usize,
    /// How long the SSE adapter waits on its queue before re-checking the background task.
    pub poll_interval: Duration,
}
