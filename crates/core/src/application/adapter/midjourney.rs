// Midjourney: plain textarea, Enter submits, no distinct submit control

use async_trait::async_trait;

use super::{ServiceAdapter, SubmitControl};
use crate::application::locator::{LocatorConfig, ShadowPath};
use crate::application::readiness::{ReadinessRule, ReadinessSpec};
use crate::domain::ServiceTarget;
use crate::error::AutomationError;
use crate::port::PageDriver;

const INPUT_SELECTOR: &str = "textarea";

#[derive(Debug, Default)]
pub struct MidjourneyAdapter {
    locator: LocatorConfig,
}

impl MidjourneyAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceAdapter for MidjourneyAdapter {
    fn target(&self) -> ServiceTarget {
        ServiceTarget::Midjourney
    }

    fn readiness(&self) -> ReadinessSpec {
        ReadinessSpec::generic(ReadinessRule::InputEmpty)
    }

    fn input_path(&self) -> ShadowPath {
        ShadowPath::direct(INPUT_SELECTOR)
    }

    fn locator(&self) -> LocatorConfig {
        self.locator
    }

    async fn find_submit(
        &self,
        _page: &dyn PageDriver,
        _config: &LocatorConfig,
    ) -> Result<SubmitControl, AutomationError> {
        Ok(SubmitControl::KeyboardOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubmitMethod;
    use crate::port::page_driver::mocks::FakeDom;
    use crate::port::DomEvent;

    #[tokio::test]
    async fn test_submits_with_enter() {
        let dom = FakeDom::new("https://www.midjourney.com/imagine");
        let input = dom.add_element(&dom.root(), "textarea", &[]);

        let outcome = MidjourneyAdapter::new()
            .submit_prompt(&dom, "a koi pond, ukiyo-e")
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.method, SubmitMethod::Keyboard);
        assert!(dom.events_for(&input).ends_with(&DomEvent::ENTER_SEQUENCE));
        // the default submit effect clears the input
        assert!(MidjourneyAdapter::new().is_ready(&dom).await.unwrap());
    }
}
