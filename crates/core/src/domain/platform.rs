// Service Target - the supported creative platforms

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::DomainError;

/// A third-party platform that receives prompts.
///
/// Each target carries the URL knowledge the session layer needs to find,
/// open and validate its tabs. DOM knowledge lives in the service adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceTarget {
    Midjourney,
    Ideogram,
    Firefly,
    Leonardo,
}

impl ServiceTarget {
    pub const ALL: [ServiceTarget; 4] = [
        ServiceTarget::Midjourney,
        ServiceTarget::Ideogram,
        ServiceTarget::Firefly,
        ServiceTarget::Leonardo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceTarget::Midjourney => "midjourney",
            ServiceTarget::Ideogram => "ideogram",
            ServiceTarget::Firefly => "firefly",
            ServiceTarget::Leonardo => "leonardo",
        }
    }

    /// Page opened when no matching tab exists
    pub fn home_url(&self) -> &'static str {
        match self {
            ServiceTarget::Midjourney => "https://www.midjourney.com/imagine",
            ServiceTarget::Ideogram => "https://ideogram.ai/t/explore",
            ServiceTarget::Firefly => "https://firefly.adobe.com/generate/images",
            ServiceTarget::Leonardo => "https://app.leonardo.ai/image-generation",
        }
    }

    /// Host fragment identifying this platform's tabs
    pub fn url_fragment(&self) -> &'static str {
        match self {
            ServiceTarget::Midjourney => "midjourney.com",
            ServiceTarget::Ideogram => "ideogram.ai",
            ServiceTarget::Firefly => "firefly.adobe.com",
            ServiceTarget::Leonardo => "app.leonardo.ai",
        }
    }

    /// URL fragments that show the platform bounced us to a sign-in flow
    pub fn login_markers(&self) -> &'static [&'static str] {
        match self {
            ServiceTarget::Midjourney => &["/login", "discord.com/oauth2"],
            ServiceTarget::Ideogram => &["/login", "accounts.google.com"],
            ServiceTarget::Firefly => &["auth.services.adobe.com", "adobelogin.com"],
            ServiceTarget::Leonardo => &["/auth/login", "accounts.google.com"],
        }
    }

    /// Selector of the sign-in affordance shown to logged-out visitors
    pub fn login_affordance(&self) -> &'static str {
        match self {
            ServiceTarget::Midjourney => "a[href*='/login']",
            ServiceTarget::Ideogram => "button[data-testid='login-button']",
            ServiceTarget::Firefly => "sp-button[data-testid='sign-in-button']",
            ServiceTarget::Leonardo => "a[href*='/auth/login']",
        }
    }

    pub fn matches_url(&self, url: &str) -> bool {
        url.contains(self.url_fragment())
    }

    pub fn is_login_url(&self, url: &str) -> bool {
        self.login_markers().iter().any(|m| url.contains(m))
    }
}

impl std::fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceTarget {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "midjourney" => Ok(ServiceTarget::Midjourney),
            "ideogram" => Ok(ServiceTarget::Ideogram),
            "firefly" => Ok(ServiceTarget::Firefly),
            "leonardo" => Ok(ServiceTarget::Leonardo),
            other => Err(DomainError::UnknownService(other.to_string())),
        }
    }
}
