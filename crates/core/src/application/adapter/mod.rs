// Service Adapters - one per platform behind a single capability set
//
// locate_input -> set_value -> submit, plus the side-effect-free is_ready.
// The orchestrator is written once against `ServiceAdapter`.

pub mod firefly;
pub mod ideogram;
pub mod leonardo;
pub mod midjourney;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::locator::{locate, LocatorConfig, ShadowPath};
use crate::application::readiness::{control_disabled, evaluate, ReadinessRule, ReadinessSpec};
use crate::domain::{ServiceTarget, SubmitMethod};
use crate::error::AutomationError;
use crate::port::{DomEvent, DriverError, ElementHandle, PageDriver};

/// Result of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub success: bool,
    pub method: SubmitMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitOutcome {
    pub fn ok(method: SubmitMethod) -> Self {
        Self {
            success: true,
            method,
            error: None,
        }
    }

    pub fn failed(method: SubmitMethod, error: impl Into<String>) -> Self {
        Self {
            success: false,
            method,
            error: Some(error.into()),
        }
    }
}

/// What an adapter found when looking for its submit control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitControl {
    Resolved(ElementHandle),
    /// Zero or several candidates; the reason is logged
    Ambiguous(String),
    /// The platform submits on Enter only
    KeyboardOnly,
}

#[async_trait]
pub trait ServiceAdapter: Send + Sync {
    fn target(&self) -> ServiceTarget;

    fn readiness(&self) -> ReadinessSpec;

    /// Path from the document to the prompt input
    fn input_path(&self) -> ShadowPath;

    fn locator(&self) -> LocatorConfig {
        LocatorConfig::default()
    }

    /// Look for the submit control with the given budget
    async fn find_submit(
        &self,
        page: &dyn PageDriver,
        config: &LocatorConfig,
    ) -> Result<SubmitControl, AutomationError>;

    async fn locate_input(&self, page: &dyn PageDriver) -> Result<ElementHandle, AutomationError> {
        locate(page, &self.input_path(), &self.locator()).await
    }

    async fn set_value(
        &self,
        page: &dyn PageDriver,
        input: &ElementHandle,
        text: &str,
    ) -> Result<(), AutomationError> {
        fill_input(page, input, text).await
    }

    async fn submit(
        &self,
        page: &dyn PageDriver,
        input: &ElementHandle,
    ) -> Result<SubmitOutcome, AutomationError> {
        let control = self
            .find_submit(page, &LocatorConfig::single_shot())
            .await
            .or_else(recover_locator_failure)?;
        click_or_enter(self.target(), page, input, control).await
    }

    /// Single look at the page, no waiting
    async fn is_ready(&self, page: &dyn PageDriver) -> Result<bool, AutomationError> {
        let config = LocatorConfig::single_shot();
        let input = match locate(page, &self.input_path(), &config).await {
            Ok(input) => input,
            Err(e) if e.is_locator_failure() => return Ok(false),
            Err(e) => return Err(e),
        };
        let value = page.read_value(&input).await?;

        let rule = self.readiness().rule;
        let submit_disabled = match rule {
            ReadinessRule::InputEmpty => None,
            ReadinessRule::InputEmptyAndSubmitEnabled => {
                match self
                    .find_submit(page, &config)
                    .await
                    .or_else(recover_locator_failure)?
                {
                    SubmitControl::Resolved(control) => {
                        Some(control_disabled(page, &control).await?)
                    }
                    _ => None,
                }
            }
        };

        Ok(evaluate(rule, &value, submit_disabled))
    }

    /// locate_input, set_value, submit
    async fn submit_prompt(
        &self,
        page: &dyn PageDriver,
        text: &str,
    ) -> Result<SubmitOutcome, AutomationError> {
        let input = self.locate_input(page).await?;
        self.set_value(page, &input, text).await?;
        self.submit(page, &input).await
    }
}

/// A submit control hidden behind an unattached hop is just unresolved
fn recover_locator_failure(err: AutomationError) -> Result<SubmitControl, AutomationError> {
    if err.is_locator_failure() {
        Ok(SubmitControl::Ambiguous(err.to_string()))
    } else {
        Err(err)
    }
}

/// Clear the input, assign through the native setter, then fire composed input/change
pub async fn fill_input(
    page: &dyn PageDriver,
    input: &ElementHandle,
    text: &str,
) -> Result<(), AutomationError> {
    page.focus(input).await?;
    page.set_value(input, "").await?;
    page.dispatch(input, DomEvent::Input).await?;
    page.set_value(input, text).await?;
    page.dispatch(input, DomEvent::Input).await?;
    page.dispatch(input, DomEvent::Change).await?;
    Ok(())
}

/// Exactly one `selector` match whose text contains `label`
pub async fn find_button_by_text(
    page: &dyn PageDriver,
    scope: &ElementHandle,
    selector: &str,
    label: &str,
) -> Result<SubmitControl, AutomationError> {
    let mut matching = Vec::new();
    for candidate in page.query_selector_all(scope, selector).await? {
        if page.text_content(&candidate).await?.contains(label) {
            matching.push(candidate);
        }
    }

    Ok(match matching.len() {
        1 => SubmitControl::Resolved(matching.remove(0)),
        0 => SubmitControl::Ambiguous(format!("no {} containing '{}'", selector, label)),
        n => SubmitControl::Ambiguous(format!("{} {} elements contain '{}'", n, selector, label)),
    })
}

/// Click an enabled control, otherwise synthesize Enter on the input.
///
/// Destroyed-frame errors are returned as `Err` so the orchestrator can
/// classify them; other driver errors become a failed outcome.
pub async fn click_or_enter(
    target: ServiceTarget,
    page: &dyn PageDriver,
    input: &ElementHandle,
    control: SubmitControl,
) -> Result<SubmitOutcome, AutomationError> {
    match control {
        SubmitControl::Resolved(button) => {
            if control_disabled(page, &button).await? {
                warn!(service = %target, "Submit control disabled, falling back to Enter");
                return press_enter(page, input).await;
            }
            debug!(service = %target, "Clicking submit control");
            match page.click(&button).await {
                Ok(()) => Ok(SubmitOutcome::ok(SubmitMethod::Button)),
                Err(e) => classify(SubmitMethod::Button, e),
            }
        }
        SubmitControl::Ambiguous(reason) => {
            warn!(service = %target, reason = %reason, "Submit control ambiguous, falling back to Enter");
            press_enter(page, input).await
        }
        SubmitControl::KeyboardOnly => press_enter(page, input).await,
    }
}

async fn press_enter(
    page: &dyn PageDriver,
    input: &ElementHandle,
) -> Result<SubmitOutcome, AutomationError> {
    for event in DomEvent::ENTER_SEQUENCE {
        if let Err(e) = page.dispatch(input, event).await {
            return classify(SubmitMethod::Keyboard, e);
        }
    }
    Ok(SubmitOutcome::ok(SubmitMethod::Keyboard))
}

fn classify(method: SubmitMethod, err: DriverError) -> Result<SubmitOutcome, AutomationError> {
    if err.is_frame_destroyed() {
        Err(err.into())
    } else {
        Ok(SubmitOutcome::failed(method, err.message()))
    }
}

/// Adapters keyed by platform
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ServiceTarget, Arc<dyn ServiceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All four built-in platforms
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(midjourney::MidjourneyAdapter::new()));
        registry.register(Arc::new(ideogram::IdeogramAdapter::new()));
        registry.register(Arc::new(firefly::FireflyAdapter::new()));
        registry.register(Arc::new(leonardo::LeonardoAdapter::new()));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ServiceAdapter>) {
        self.adapters.insert(adapter.target(), adapter);
    }

    pub fn get(&self, target: ServiceTarget) -> Option<Arc<dyn ServiceAdapter>> {
        self.adapters.get(&target).cloned()
    }
}
