// Ideogram: plain textarea, a "Generate" button, strict readiness

use async_trait::async_trait;

use super::{find_button_by_text, ServiceAdapter, SubmitControl};
use crate::application::locator::{LocatorConfig, ShadowPath};
use crate::application::readiness::{ReadinessRule, ReadinessSpec};
use crate::domain::ServiceTarget;
use crate::error::AutomationError;
use crate::port::PageDriver;

const INPUT_SELECTOR: &str = "textarea";
const SUBMIT_SELECTOR: &str = "button";
const SUBMIT_LABEL: &str = "Generate";

#[derive(Debug, Default)]
pub struct IdeogramAdapter {
    locator: LocatorConfig,
}

impl IdeogramAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceAdapter for IdeogramAdapter {
    fn target(&self) -> ServiceTarget {
        ServiceTarget::Ideogram
    }

    fn readiness(&self) -> ReadinessSpec {
        ReadinessSpec::generic(ReadinessRule::InputEmptyAndSubmitEnabled)
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
