use std::future::Future;

pub mod client;
pub mod error;
pub mod types;

pub use client::HttpGenerator;
pub use error::GeneratorError;
pub use types::{GenerateRequest, GenerateResponse};

/// The external generation task.
///
/// Implemented over HTTP by [`HttpGenerator`]; tests and demo mode plug in
/// local implementations. The returned future must be `Send` because attempts
/// run on spawned worker tasks.
pub trait DiagramGenerator: Send + Sync + 'static {
    fn run(
        &self,
        job_id: &str,
        owner_id: &str,
    ) -> impl Future<Output = Result<GenerateResponse, GeneratorError>> + Send;
}
