// ABOUTME: SDK script locations and vendor options resolved from the environment
// ABOUTME: Falls back to the vendors' public script URLs when nothing is configured

use social_login_config::constants::{
    DEFAULT_APPLE_SDK_URL, DEFAULT_FACEBOOK_SDK_URL, DEFAULT_FACEBOOK_SDK_VERSION,
    DEFAULT_GOOGLE_SDK_URL, SOCIAL_LOGIN_APPLE_SDK_URL, SOCIAL_LOGIN_FACEBOOK_SDK_URL,
    SOCIAL_LOGIN_FACEBOOK_SDK_VERSION, SOCIAL_LOGIN_GOOGLE_SDK_URL,
};
use tracing::debug;
use url::Url;

use crate::{
    error::{AuthError, AuthResult},
    provider::ProviderKind,
};

/// Where each vendor SDK is loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkSettings {
    pub google_sdk_url: String,
    pub facebook_sdk_url: String,
    pub apple_sdk_url: String,
    pub facebook_sdk_version: String,
}

impl Default for SdkSettings {
    fn default() -> Self {
        Self {
            google_sdk_url: DEFAULT_GOOGLE_SDK_URL.to_string(),
            facebook_sdk_url: DEFAULT_FACEBOOK_SDK_URL.to_string(),
            apple_sdk_url: DEFAULT_APPLE_SDK_URL.to_string(),
            facebook_sdk_version: DEFAULT_FACEBOOK_SDK_VERSION.to_string(),
        }
    }
}

impl SdkSettings {
    /// Resolve settings from process environment variables
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |name: &str, default: &str| -> String {
            match lookup(name).filter(|v| !v.trim().is_empty()) {
                Some(value) => {
                    debug!("Using {} from environment", name);
                    value.trim().to_string()
                }
                None => default.to_string(),
            }
        };

        let settings = Self {
            google_sdk_url: resolve(SOCIAL_LOGIN_GOOGLE_SDK_URL, DEFAULT_GOOGLE_SDK_URL),
            facebook_sdk_url: resolve(SOCIAL_LOGIN_FACEBOOK_SDK_URL, DEFAULT_FACEBOOK_SDK_URL),
            apple_sdk_url: resolve(SOCIAL_LOGIN_APPLE_SDK_URL, DEFAULT_APPLE_SDK_URL),
            facebook_sdk_version: resolve(
                SOCIAL_LOGIN_FACEBOOK_SDK_VERSION,
                DEFAULT_FACEBOOK_SDK_VERSION,
            ),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Script URL for a provider
    pub fn sdk_url(&self, provider: ProviderKind) -> &str {
        match provider {
            ProviderKind::Google => &self.google_sdk_url,
            ProviderKind::Facebook => &self.facebook_sdk_url,
            ProviderKind::Apple => &self.apple_sdk_url,
        }
    }

    /// Check that every script location is an absolute http(s) URL
    pub fn validate(&self) -> AuthResult<()> {
        for provider in ProviderKind::all() {
            let raw = self.sdk_url(provider);
            let url = Url::parse(raw).map_err(|e| {
                AuthError::Configuration(format!("Invalid {} SDK URL '{}': {}", provider, raw, e))
            })?;

            if !matches!(url.scheme(), "http" | "https") {
                return Err(AuthError::Configuration(format!(
                    "Unsupported {} SDK URL scheme: {}",
                    provider,
                    url.scheme()
                )));
            }
        }

        if !self.facebook_sdk_version.starts_with('v') {
            return Err(AuthError::Configuration(format!(
                "Facebook SDK version must look like v18.0, got {}",
                self.facebook_sdk_version
            )));
        }

        Ok(())
    }
}
