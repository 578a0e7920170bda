//! RPC Method Handlers
//!
//! Thin adapters from wire types to the prompt service.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use tracing::info;

use promptrelay_core::application::{PromptService, SessionStatus, SubmitResponse};
use promptrelay_core::domain::ServiceTarget;
use promptrelay_core::error::AppError;

use crate::error::to_rpc_error;
use crate::types::{BatchRequest, BatchResponse, CloseResponse, ServiceRequest, SubmitRequest};

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<PromptService>,
}

fn parse_service(name: &str) -> Result<ServiceTarget, ErrorObjectOwned> {
    name.parse::<ServiceTarget>()
        .map_err(|e| to_rpc_error(AppError::from(e)))
}

impl RpcHandler {
    pub fn new(service: Arc<PromptService>) -> Self {
        Self { service }
    }

    /// prompt.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        let target = parse_service(&params.service)?;
        info!(service = %target, "prompt.submit.v1");
        self.service
            .submit(target, params.prompt)
            .await
            .map_err(to_rpc_error)
    }

    /// prompt.batch.v1
    ///
    /// Partial failures come back as counts; only a validation problem or a
    /// logged-out platform is an error.
    pub async fn batch(&self, params: BatchRequest) -> Result<BatchResponse, ErrorObjectOwned> {
        let target = parse_service(&params.service)?;
        info!(service = %target, count = params.prompts.len(), "prompt.batch.v1");
        let report = self
            .service
            .batch(target, params.prompts, params.delay_ms)
            .await
            .map_err(to_rpc_error)?;

        // nothing was submitted at all
        if report.halted_by.is_some() && report.success_count == 0 {
            return Err(to_rpc_error(AppError::AuthenticationRequired(
                target.to_string(),
            )));
        }
        Ok(report.into())
    }

    /// session.status.v1
    pub async fn status(&self, params: ServiceRequest) -> Result<SessionStatus, ErrorObjectOwned> {
        let target = parse_service(&params.service)?;
        self.service.status(target).await.map_err(to_rpc_error)
    }

    /// session.close.v1
    pub async fn close(&self, params: ServiceRequest) -> Result<CloseResponse, ErrorObjectOwned> {
        let target = parse_service(&params.service)?;
        let closed = self.service.close(target).await.map_err(to_rpc_error)?;
        Ok(CloseResponse {
            service: target.to_string(),
            closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use promptrelay_core::application::AdapterRegistry;
    use promptrelay_core::port::id_provider::mocks::SequentialIdProvider;
    use promptrelay_core::port::page_driver::mocks::FakeDom;
    use promptrelay_core::port::session_provider::mocks::MockSessionProvider;
    use promptrelay_core::port::time_provider::mocks::FixedTimeProvider;

    fn handler(sessions: Arc<MockSessionProvider>) -> RpcHandler {
        RpcHandler::new(Arc::new(PromptService::new(
            sessions,
            AdapterRegistry::with_defaults(),
            Arc::new(SequentialIdProvider::default()),
            Arc::new(FixedTimeProvider::new(0)),
        )))
    }

    fn midjourney() -> Arc<FakeDom> {
        let dom = Arc::new(FakeDom::new("https://www.midjourney.com/imagine"));
        dom.add_element(&dom.root(), "textarea", &[]);
        dom
    }

    #[tokio::test]
    async fn test_submit() {
        let sessions =
            Arc::new(MockSessionProvider::new().with_page(ServiceTarget::Midjourney, midjourney()));
        let response = handler(sessions)
            .submit(SubmitRequest {
                service: "midjourney".into(),
                prompt: "a glass whale".into(),
            })
            .await
            .unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_unknown_service_is_validation_error() {
        let err = handler(Arc::new(MockSessionProvider::new()))
            .submit(SubmitRequest {
                service: "canva".into(),
                prompt: "x".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_empty_batch_is_validation_error() {
        let err = handler(Arc::new(MockSessionProvider::new()))
            .batch(BatchRequest {
                service: "ideogram".into(),
                prompts: vec![],
                delay_ms: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_logged_out_batch_is_auth_error() {
        let sessions = Arc::new(MockSessionProvider::new());
        sessions.log_out(ServiceTarget::Firefly);
        let err = handler(sessions)
            .batch(BatchRequest {
                service: "firefly".into(),
                prompts: vec!["a".into(), "b".into()],
                delay_ms: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::AUTHENTICATION_REQUIRED);
    }

    #[tokio::test]
    async fn test_batch_reports_counts() {
        let sessions =
            Arc::new(MockSessionProvider::new().with_page(ServiceTarget::Midjourney, midjourney()));
        let response = handler(sessions)
            .batch(BatchRequest {
                service: "midjourney".into(),
                prompts: vec!["one".into(), "two".into()],
                delay_ms: 0,
            })
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.success_count, 2);
        assert_eq!(response.results.len(), 2);
    }

    #[tokio::test]
    async fn test_status_and_close() {
        let sessions =
            Arc::new(MockSessionProvider::new().with_page(ServiceTarget::Midjourney, midjourney()));
        let handler = handler(sessions);

        let status = handler
            .status(ServiceRequest {
                service: "midjourney".into(),
            })
            .await
            .unwrap();
        assert_eq!(status.backend, "mock");
        assert!(status.logged_in);

        let closed = handler
            .close(ServiceRequest {
                service: "midjourney".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            closed,
            CloseResponse {
                service: "midjourney".into(),
                closed: true
            }
        );
    }
}
