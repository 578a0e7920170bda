// Job dispatch: relay requests in, relay results out

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use promptrelay_core::application::PromptService;
use promptrelay_core::domain::ServiceTarget;
use promptrelay_core::AppError;

use crate::protocol::{BridgeMessage, Incoming};

#[derive(Clone)]
pub struct Dispatcher {
    service: Arc<PromptService>,
}

impl Dispatcher {
    pub fn new(service: Arc<PromptService>) -> Self {
        Self { service }
    }

    /// Whether the frame is a job that should run off the read loop
    pub fn is_job(incoming: &Incoming) -> bool {
        matches!(
            incoming,
            Incoming::Message(BridgeMessage::SubmitPrompt { .. })
                | Incoming::Message(BridgeMessage::SubmitBatch { .. })
        )
    }

    /// Handle one incoming frame, returning the reply to send (if any)
    pub async fn handle(&self, incoming: Incoming) -> Option<BridgeMessage> {
        let message = match incoming {
            Incoming::Message(message) => message,
            Incoming::Unknown(kind) => {
                warn!(kind = %kind, "Ignoring unknown bridge message");
                return None;
            }
        };

        match message {
            BridgeMessage::SubmitPrompt {
                message_id,
                service,
                prompt,
            } => Some(self.submit_prompt(message_id, &service, prompt).await),
            BridgeMessage::SubmitBatch {
                message_id,
                service,
                prompts,
                delay_ms,
            } => Some(self.submit_batch(message_id, &service, prompts, delay_ms).await),
            BridgeMessage::Ping => Some(BridgeMessage::Pong),
            BridgeMessage::Pong | BridgeMessage::AuthSuccess => {
                debug!("Relay acknowledgement");
                None
            }
            other => {
                warn!(message = ?other, "Unexpected message direction, ignoring");
                None
            }
        }
    }

    async fn submit_prompt(&self, message_id: String, service: &str, prompt: String) -> BridgeMessage {
        info!(message_id = %message_id, service = %service, "Bridge submit_prompt");
        let outcome = match parse_service(service) {
            Ok(target) => self.service.submit(target, prompt).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => BridgeMessage::PromptResult {
                message_id,
                success: response.success,
                error: response.error,
            },
            Err(e) => {
                error!(message_id = %message_id, error = %e, "Bridge submit failed");
                BridgeMessage::PromptResult {
                    message_id,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn submit_batch(
        &self,
        message_id: String,
        service: &str,
        prompts: Vec<String>,
        delay_ms: u64,
    ) -> BridgeMessage {
        info!(
            message_id = %message_id,
            service = %service,
            count = prompts.len(),
            "Bridge submit_batch"
        );
        let outcome = match parse_service(service) {
            Ok(target) => self.service.batch(target, prompts, delay_ms).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => BridgeMessage::BatchResult {
                message_id,
                success: report.success(),
                error: report.halted_by.clone(),
                success_count: report.success_count,
                fail_count: report.fail_count,
                results: report.results,
            },
            Err(e) => {
                error!(message_id = %message_id, error = %e, "Bridge batch rejected");
                BridgeMessage::BatchResult {
                    message_id,
                    success: false,
                    results: Vec::new(),
                    success_count: 0,
                    fail_count: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn parse_service(service: &str) -> Result<ServiceTarget, AppError> {
    Ok(service.parse::<ServiceTarget>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrelay_core::application::AdapterRegistry;
    use promptrelay_core::port::id_provider::mocks::SequentialIdProvider;
    use promptrelay_core::port::page_driver::mocks::FakeDom;
    use promptrelay_core::port::session_provider::mocks::MockSessionProvider;
    use promptrelay_core::port::time_provider::mocks::FixedTimeProvider;

    fn dispatcher(sessions: MockSessionProvider) -> Dispatcher {
        Dispatcher::new(Arc::new(PromptService::new(
            Arc::new(sessions),
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
    async fn test_submit_prompt_replies_with_same_message_id() {
        let dispatcher =
            dispatcher(MockSessionProvider::new().with_page(ServiceTarget::Midjourney, midjourney()));

        let reply = dispatcher
            .handle(Incoming::Message(BridgeMessage::SubmitPrompt {
                message_id: "m-41".to_string(),
                service: "midjourney".to_string(),
                prompt: "a lighthouse in fog".to_string(),
            }))
            .await;

        assert_eq!(
            reply,
            Some(BridgeMessage::PromptResult {
                message_id: "m-41".to_string(),
                success: true,
                error: None,
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_service_is_reported_not_raised() {
        let dispatcher = dispatcher(MockSessionProvider::new());

        let reply = dispatcher
            .handle(Incoming::Message(BridgeMessage::SubmitPrompt {
                message_id: "m-1".to_string(),
                service: "dalle".to_string(),
                prompt: "x".to_string(),
            }))
            .await;

        match reply {
            Some(BridgeMessage::PromptResult { success, error, .. }) => {
                assert!(!success);
                assert!(error.unwrap().contains("dalle"));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_logged_out_batch_reports_halt() {
        let sessions = MockSessionProvider::new();
        sessions.log_out(ServiceTarget::Ideogram);
        let dispatcher = dispatcher(sessions);

        let reply = dispatcher
            .handle(Incoming::Message(BridgeMessage::SubmitBatch {
                message_id: "b-7".to_string(),
                service: "ideogram".to_string(),
                prompts: vec!["one".to_string(), "two".to_string()],
                delay_ms: 0,
            }))
            .await;

        match reply {
            Some(BridgeMessage::BatchResult {
                message_id,
                success,
                results,
                success_count,
                fail_count,
                error,
            }) => {
                assert_eq!(message_id, "b-7");
                assert!(!success);
                assert_eq!(results.len(), 2);
                assert_eq!((success_count, fail_count), (0, 2));
                assert!(error.is_some());
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ping_and_unknown() {
        let dispatcher = dispatcher(MockSessionProvider::new());
        assert_eq!(
            dispatcher.handle(Incoming::Message(BridgeMessage::Ping)).await,
            Some(BridgeMessage::Pong)
        );
        assert_eq!(
            dispatcher.handle(Incoming::Unknown("tab_update".to_string())).await,
            None
        );
    }
}
