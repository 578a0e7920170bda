// Shadow Traversal Locator
// Walks an explicit path of shadow hosts, retrying only at the hop that is
// not attached yet, then resolves the terminal selector inside the last root.

use tracing::{debug, warn};

use crate::application::constants::{LOCATOR_INTERVAL, LOCATOR_MAX_ATTEMPTS, TERMINAL_MAX_ATTEMPTS};
use crate::application::poll::{poll_until, PollOutcome, PollSpec};
use crate::error::AutomationError;
use crate::port::{ElementHandle, PageDriver};

/// Ordered shadow hosts followed by the selector of the wanted element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowPath {
    hops: Vec<String>,
    terminal: String,
}

impl ShadowPath {
    pub fn new<I, S>(hops: I, terminal: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hops: hops.into_iter().map(Into::into).collect(),
            terminal: terminal.into(),
        }
    }

    /// Element in the light DOM, no hops
    pub fn direct(terminal: impl Into<String>) -> Self {
        Self {
            hops: Vec::new(),
            terminal: terminal.into(),
        }
    }

    pub fn hops(&self) -> &[String] {
        &self.hops
    }

    pub fn terminal(&self) -> &str {
        &self.terminal
    }
}

/// Retry budgets for the hop walk and the terminal lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorConfig {
    pub hop: PollSpec,
    pub terminal: PollSpec,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            hop: PollSpec::new(LOCATOR_INTERVAL, LOCATOR_MAX_ATTEMPTS),
            terminal: PollSpec::new(LOCATOR_INTERVAL, TERMINAL_MAX_ATTEMPTS),
        }
    }
}

impl LocatorConfig {
    /// One look, no waiting (used by readiness checks)
    pub fn single_shot() -> Self {
        Self {
            hop: PollSpec::new(LOCATOR_INTERVAL, 1),
            terminal: PollSpec::new(LOCATOR_INTERVAL, 1),
        }
    }
}

/// Resolve `path` on `page`.
///
/// # Errors
/// - `LocatorTimeout` naming the hop whose shadow root never attached
/// - `ElementNotFound` if the terminal selector is absent from the final root
/// - `Driver` for any page error; the walk stops at the first one
pub async fn locate(
    page: &dyn PageDriver,
    path: &ShadowPath,
    config: &LocatorConfig,
) -> Result<ElementHandle, AutomationError> {
    let root = resolve_root(page, &path.hops, config.hop).await?;

    let terminal = path.terminal.as_str();
    let outcome = poll_until(config.terminal, move |_| {
        let scope = root.clone();
        async move { page.query_selector(&scope, terminal).await }
    })
    .await?;

    outcome
        .into_value()
        .ok_or_else(|| AutomationError::ElementNotFound {
            selector: terminal.to_string(),
        })
}

/// Walk `hops` from the document and return the innermost shadow root
/// (the document itself when `hops` is empty).
pub async fn resolve_root(
    page: &dyn PageDriver,
    hops: &[String],
    spec: PollSpec,
) -> Result<ElementHandle, AutomationError> {
    let mut root = page.document().await?;

    for (hop_index, hop) in hops.iter().enumerate() {
        let scope = root.clone();
        let outcome = poll_until(spec, move |_| {
            let scope = scope.clone();
            async move {
                match page.query_selector(&scope, hop).await? {
                    Some(host) => page.shadow_root(&host).await,
                    None => Ok(None),
                }
            }
        })
        .await?;

        match outcome {
            PollOutcome::Ready { value, attempts } => {
                debug!(hop_index, hop = %hop, attempts, "Shadow hop resolved");
                root = value;
            }
            PollOutcome::Exhausted { attempts } => {
                warn!(hop_index, hop = %hop, attempts, "Shadow hop never attached");
                return Err(AutomationError::LocatorTimeout {
                    hop_index,
                    hop: hop.clone(),
                    attempts,
                });
            }
        }
    }

    Ok(root)
}
