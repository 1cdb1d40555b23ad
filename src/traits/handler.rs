use async_trait::async_trait;

use crate::protocol::{ExecutionRequest, ExecutionResponse};

/// Anything that turns one request into one response: the enclave pipeline
/// on one side of the boundary, the enclave link on the other.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, req: ExecutionRequest) -> ExecutionResponse;

    fn name(&self) -> &'static str;
}
