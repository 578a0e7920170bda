// Leonardo: plain textarea, submit-typed "Generate" button, slow to settle

use async_trait::async_trait;

use super::{find_button_by_text, ServiceAdapter, SubmitControl};
use crate::application::locator::{LocatorConfig, ShadowPath};
use crate::application::readiness::{ReadinessRule, ReadinessSpec};
use crate::domain::ServiceTarget;
use crate::error::AutomationError;
use crate::port::PageDriver;

const INPUT_SELECTOR: &str = "textarea";
const SUBMIT_SELECTOR: &str = "button[type=\"submit\"]";
const SUBMIT_LABEL: &str = "Generate";

#[derive(Debug, Default)]
pub struct LeonardoAdapter {
    locator: LocatorConfig,
}

impl LeonardoAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceAdapter for LeonardoAdapter {
    fn target(&self) -> ServiceTarget {
        ServiceTarget::Leonardo
    }

    fn readiness(&self) -> ReadinessSpec {
        ReadinessSpec::slow(ReadinessRule::InputEmptyAndSubmitEnabled)
    }

    fn input_path(&self) -> ShadowPath {
        ShadowPath::direct(INPUT_SELECTOR)
    }

    fn locator(&self) -> LocatorConfig {
        self.locator
    }

    async fn find_submit(
        &self,
        page: &dyn PageDriver,
        _config: &LocatorConfig,
    ) -> Result<SubmitControl, AutomationError> {
        let document = page.document().await?;
        find_button_by_text(page, &document, SUBMIT_SELECTOR, SUBMIT_LABEL).await
    }
}
