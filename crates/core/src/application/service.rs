// Prompt Service - the command boundary's use cases (submit, batch, status, close)
// Shared by the JSON-RPC server and the bridge client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::adapter::AdapterRegistry;
use crate::application::orchestrator::{BatchOrchestrator, BatchReport};
use crate::domain::{BatchRequest, ServiceTarget, SubmitMethod};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, SessionProvider, TimeProvider};

/// Single-prompt result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<SubmitMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub service: ServiceTarget,
    pub backend: String,
    /// Advisory only
    pub logged_in: bool,
}

pub struct PromptService {
    orchestrator: BatchOrchestrator,
    sessions: Arc<dyn SessionProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl PromptService {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        adapters: AdapterRegistry,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            orchestrator: BatchOrchestrator::new(Arc::clone(&sessions), adapters, time_provider),
            sessions,
            id_provider,
        }
    }

    /// Submit one prompt (a one-job batch, no readiness wait)
    ///
    /// # Errors
    /// - AppError::Validation for a blank or oversized prompt
    /// - AppError::AuthenticationRequired if the platform session is logged out
    pub async fn submit(&self, service: ServiceTarget, prompt: String) -> Result<SubmitResponse> {
        let report = self.batch(service, vec![prompt], 0).await?;
        if report.halted_by.is_some() {
            return Err(AppError::AuthenticationRequired(service.to_string()));
        }
        let result = report
            .results
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("batch of one returned no result".to_string()))?;

        Ok(SubmitResponse {
            success: result.success,
            error: result.error,
            note: result.note,
            method: result.method,
        })
    }

    /// Submit prompts in order; partial failures are reported, not raised
    pub async fn batch(
        &self,
        service: ServiceTarget,
        prompts: Vec<String>,
        delay_ms: u64,
    ) -> Result<BatchReport> {
        let request = BatchRequest::from_prompts(service, prompts, delay_ms, || {
            self.id_provider.generate_id()
        })?;
        Ok(self.orchestrator.run(request).await)
    }

    /// Waits for any batch on the platform; the login check navigates its page
    pub async fn status(&self, service: ServiceTarget) -> Result<SessionStatus> {
        let lock = self.orchestrator.target_lock(service);
        let _guard = lock.lock().await;
        let logged_in = self.sessions.is_logged_in(service).await?;
        Ok(SessionStatus {
            service,
            backend: self.sessions.backend().to_string(),
            logged_in,
        })
    }

    pub async fn close(&self, service: ServiceTarget) -> Result<bool> {
        let lock = self.orchestrator.target_lock(service);
        let _guard = lock.lock().await;
        let closed = self.sessions.close(service).await?;
        info!(service = %service, closed, "Session close requested");
        Ok(closed)
    }

    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }
}
