// Firefly: prompt input three shadow roots deep, Spectrum sp-button submit.
// A successful generation navigates the page, so a destroyed frame after
// submit is the normal success signal.

use async_trait::async_trait;

use super::{ServiceAdapter, SubmitControl};
use crate::application::locator::{resolve_root, LocatorConfig, ShadowPath};
use crate::application::readiness::{ReadinessRule, ReadinessSpec};
use crate::domain::ServiceTarget;
use crate::error::AutomationError;
use crate::port::PageDriver;

const APP_HOST: &str = "firefly-image-generation";
const PROMPT_BAR: &str = "firefly-prompt-bar";
const TEXT_FIELD: &str = "firefly-textfield";
const INPUT_SELECTOR: &str = "textarea";
const SUBMIT_SELECTOR: &str = "sp-button[data-testid=\"generate-button\"]";

#[derive(Debug, Default)]
pub struct FireflyAdapter {
    locator: LocatorConfig,
}

impl FireflyAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceAdapter for FireflyAdapter {
    fn target(&self) -> ServiceTarget {
        ServiceTarget::Firefly
    }

    fn readiness(&self) -> ReadinessSpec {
        ReadinessSpec::slow(ReadinessRule::InputEmptyAndSubmitEnabled)
    }

    fn input_path(&self) -> ShadowPath {
        ShadowPath::new([APP_HOST, PROMPT_BAR, TEXT_FIELD], INPUT_SELECTOR)
    }

    fn locator(&self) -> LocatorConfig {
        self.locator
    }

    /// The button lives in the prompt bar's shadow root
    async fn find_submit(
        &self,
        page: &dyn PageDriver,
        config: &LocatorConfig,
    ) -> Result<SubmitControl, AutomationError> {
        let hops = [APP_HOST.to_string(), PROMPT_BAR.to_string()];
        let bar = resolve_root(page, &hops, config.hop).await?;

        let mut buttons = page.query_selector_all(&bar, SUBMIT_SELECTOR).await?;
        Ok(match buttons.len() {
            1 => SubmitControl::Resolved(buttons.remove(0)),
            n => SubmitControl::Ambiguous(format!("{} generate buttons in prompt bar", n)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::page_driver::mocks::{FakeDom, SubmitEffect};
    use crate::port::ElementHandle;

    struct Page {
        dom: FakeDom,
        input: ElementHandle,
        button_inner: ElementHandle,
    }

    fn firefly_page() -> Page {
        let dom = FakeDom::new("https://firefly.adobe.com/generate/images");
        let app = dom.add_element(&dom.root(), APP_HOST, &[]);
        let app_root = dom.attach_shadow(&app, 0);
        let bar = dom.add_element(&app_root, PROMPT_BAR, &[]);
        let bar_root = dom.attach_shadow(&bar, 0);
        let field = dom.add_element(&bar_root, TEXT_FIELD, &[]);
        let field_root = dom.attach_shadow(&field, 0);
        let input = dom.add_element(&field_root, INPUT_SELECTOR, &[]);
        let button = dom.add_element(&bar_root, "sp-button", &[SUBMIT_SELECTOR]);
        dom.set_text(&button, "Generate");
        let button_root = dom.attach_shadow(&button, 0);
        let button_inner = dom.add_element(&button_root, "button", &[]);
        Page {
            dom,
            input,
            button_inner,
        }
    }

    #[tokio::test]
    async fn test_navigation_on_submit_surfaces_as_frame_destroyed() {
        let page = firefly_page();
        page.dom.push_submit_effect(SubmitEffect::DestroyFrame);

        let err = FireflyAdapter::new()
            .submit_prompt(&page.dom, "neon jellyfish")
            .await
            .unwrap_err();

        assert!(err.is_frame_destroyed());
    }

    #[tokio::test]
    async fn test_inner_shadow_button_decides_disabled() {
        let page = firefly_page();
        let adapter = FireflyAdapter::new();

        assert!(adapter.is_ready(&page.dom).await.unwrap());
        page.dom.set_disabled(&page.button_inner, true);
        assert!(!adapter.is_ready(&page.dom).await.unwrap());
    }

    #[tokio::test]
    async fn test_sets_value_deep_inside_shadow_roots() {
        let page = firefly_page();
        page.dom.push_submit_effect(SubmitEffect::Nothing);

        let outcome = FireflyAdapter::new()
            .submit_prompt(&page.dom, "paper-cut mountains")
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(page.dom.value_of(&page.input), "paper-cut mountains");
    }
}
