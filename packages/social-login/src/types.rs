// ABOUTME: Core type definitions for provider sessions
// ABOUTME: Includes provider configuration, session state, and the normalized identity shape

use serde::{Deserialize, Serialize};

use crate::{error::AuthError, provider::ProviderKind};

/// Per-adapter provider configuration
///
/// Any change to a field invalidates the current session and forces the adapter
/// to load and initialize the vendor SDK again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Client id (Google, Apple) or app id (Facebook)
    pub identifier: String,
    pub scope: Option<String>,
    pub redirect_target: Option<String>,
    pub use_popup: Option<bool>,
    pub state: Option<String>,
}

impl ProviderConfig {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            scope: None,
            redirect_target: None,
            use_popup: None,
            state: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_redirect_target(mut self, target: impl Into<String>) -> Self {
        self.redirect_target = Some(target.into());
        self
    }

    pub fn with_popup(mut self, use_popup: bool) -> Self {
        self.use_popup = Some(use_popup);
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Scope to request, falling back to the provider default
    pub fn scope_for(&self, provider: ProviderKind) -> String {
        self.scope
            .clone()
            .unwrap_or_else(|| provider.default_scope().to_string())
    }
}

/// Lifecycle phase of a session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Uninitialized,
    Initializing,
    Ready,
    Busy,
}

/// Observable state of a session controller
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: Phase,
    pub last_error: Option<AuthError>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Uninitialized,
            last_error: None,
        }
    }
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Initializing | Phase::Busy)
    }

    /// Busy is only reachable from Ready, so it counts as initialized
    pub fn is_initialized(&self) -> bool {
        matches!(self.phase, Phase::Ready | Phase::Busy)
    }
}

/// Vendor-agnostic result of a successful sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedIdentity {
    pub provider: ProviderKind,
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<String>,
}

/// Treat empty vendor strings as absent
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
