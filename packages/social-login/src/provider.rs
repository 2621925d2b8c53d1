// ABOUTME: Identity provider definitions for the script-loaded sign-in SDKs
// ABOUTME: Supports Google, Facebook, and Apple with provider-specific globals, scopes, and messages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthError, AuthResult};

/// Global the Google platform library registers itself on
pub const GAPI_GLOBAL: &str = "gapi";
/// Global the Facebook SDK registers itself on
pub const FB_GLOBAL: &str = "FB";
/// Callback the Facebook SDK invokes once it has loaded
pub const FB_ASYNC_INIT_GLOBAL: &str = "fbAsyncInit";
/// Global the Sign in with Apple JS library registers itself on
pub const APPLE_ID_GLOBAL: &str = "AppleID";

/// Supported identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Facebook,
    Apple,
}

impl ProviderKind {
    /// Get default scope for this provider
    pub fn default_scope(&self) -> &'static str {
        match self {
            Self::Google => "profile email",
            Self::Facebook => "public_profile,email",
            Self::Apple => "name email",
        }
    }

    /// Get the global the vendor SDK registers on once its script runs
    pub fn sdk_global(&self) -> &'static str {
        match self {
            Self::Google => GAPI_GLOBAL,
            Self::Facebook => FB_GLOBAL,
            Self::Apple => APPLE_ID_GLOBAL,
        }
    }

    /// Message used when initialization fails without a vendor message
    pub fn init_failure_message(&self) -> &'static str {
        match self {
            Self::Google => "Failed to initialize Google Sign-In",
            Self::Facebook => "Failed to initialize Facebook SDK",
            Self::Apple => "Failed to initialize Apple Sign-In",
        }
    }

    /// Message used when sign-in fails without a vendor message
    pub fn sign_in_failure_message(&self) -> &'static str {
        match self {
            Self::Google => "Google Sign-In failed",
            Self::Facebook => "Facebook Sign-In failed",
            Self::Apple => "Apple Sign-In failed",
        }
    }

    /// Get all supported providers
    pub fn all() -> Vec<Self> {
        vec![Self::Google, Self::Facebook, Self::Apple]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google => write!(f, "google"),
            Self::Facebook => write!(f, "facebook"),
            Self::Apple => write!(f, "apple"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = AuthError;

    fn from_str(s: &str) -> AuthResult<Self> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            "apple" => Ok(Self::Apple),
            _ => Err(AuthError::Configuration(format!(
                "Unknown provider: {}. Supported: google, facebook, apple",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("google", ProviderKind::Google)]
    #[case("GOOGLE", ProviderKind::Google)]
    #[case("facebook", ProviderKind::Facebook)]
    #[case("Apple", ProviderKind::Apple)]
    fn test_provider_parsing(#[case] input: &str, #[case] expected: ProviderKind) {
        assert_eq!(input.parse::<ProviderKind>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let err = "github".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn test_provider_globals() {
        assert_eq!(ProviderKind::Google.sdk_global(), "gapi");
        assert_eq!(ProviderKind::Facebook.sdk_global(), "FB");
        assert_eq!(ProviderKind::Apple.sdk_global(), "AppleID");
    }

    #[test]
    fn test_provider_display_round_trips() {
        for provider in ProviderKind::all() {
            assert_eq!(provider.to_string().parse::<ProviderKind>().unwrap(), provider);
        }
    }
}
