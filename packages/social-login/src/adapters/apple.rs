// ABOUTME: Apple adapter over the Sign in with Apple JS auth object
// ABOUTME: Sign-in is a single vendor promise whose partial responses degrade to optional fields

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{info, warn};

use crate::{
    adapters::{require_identifier, AdapterContext, IdentityParts, ProviderAdapter, ScriptSlot},
    error::{AuthError, AuthResult, VendorError},
    provider::ProviderKind,
    registry::ProviderRegistry,
    script::ResourceHandle,
    types::{NormalizedIdentity, ProviderConfig},
};

/// Options of `AppleID.auth.init`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleInitConfig {
    pub client_id: String,
    pub scope: String,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub use_popup: bool,
}

/// Call surface of `window.AppleID.auth`
///
/// `sign_in` resolves with
/// `{ "authorization": { code, id_token, state }, "user"?: { email?, name?: { firstName, lastName } } }`;
/// `user` is only present the first time a user authorizes the app.
#[async_trait(?Send)]
pub trait AppleSdk {
    /// `AppleID.auth.init(config)`
    fn init(&self, config: AppleInitConfig) -> Result<(), VendorError>;

    /// `AppleID.auth.signIn()`
    async fn sign_in(&self) -> Result<Value, VendorError>;
}

#[derive(Debug, Deserialize)]
struct AppleSignInResponse {
    authorization: Option<Authorization>,
    user: Option<AppleUser>,
}

#[derive(Debug, Deserialize)]
struct Authorization {
    code: Option<String>,
    id_token: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppleUser {
    email: Option<String>,
    name: Option<AppleName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppleName {
    first_name: Option<String>,
    last_name: Option<String>,
}

/// Claims read from the identity token; the signature is not checked here
#[derive(Debug, Deserialize)]
struct IdentityClaims {
    sub: Option<String>,
    email: Option<String>,
}

/// Native auth object adapter for Sign in with Apple. Apple offers no
/// programmatic sign-out, so this adapter only signs in.
pub struct AppleAdapter {
    config: RefCell<ProviderConfig>,
    script_url: String,
    attributes: BTreeMap<String, String>,
    registry: Rc<dyn ProviderRegistry>,
    slot: ScriptSlot,
}

impl AppleAdapter {
    pub fn new(context: &AdapterContext, config: ProviderConfig) -> Self {
        Self {
            config: RefCell::new(config),
            script_url: context.settings.sdk_url(ProviderKind::Apple).to_string(),
            attributes: BTreeMap::new(),
            registry: context.registry.clone(),
            slot: ScriptSlot::new(context.loader.clone()),
        }
    }

    pub fn resource(&self) -> Option<ResourceHandle> {
        self.slot.current()
    }
}

#[async_trait(?Send)]
impl ProviderAdapter for AppleAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Apple
    }

    fn config(&self) -> ProviderConfig {
        self.config.borrow().clone()
    }

    fn reconfigure(&self, config: ProviderConfig) {
        *self.config.borrow_mut() = config;
    }

    async fn init(&self) -> AuthResult<()> {
        let config = self.config();
        require_identifier(&config, ProviderKind::Apple)?;
        info!("Initializing Sign in with Apple for client {}", config.identifier);

        let init_config = AppleInitConfig {
            client_id: config.identifier.clone(),
            scope: config.scope_for(ProviderKind::Apple),
            redirect_uri: config.redirect_target.clone(),
            state: config.state.clone(),
            use_popup: config.use_popup.unwrap_or(false),
        };
        let registry = self.registry.clone();
        let handle = self
            .slot
            .acquire(&self.script_url, self.attributes.clone(), move || {
                let apple = registry.apple().ok_or_else(|| {
                    AuthError::InitializationFailed(
                        "Sign in with Apple library did not register AppleID".to_string(),
                    )
                })?;
                apple.init(init_config).map_err(|e| {
                    e.into_initialization_failed(ProviderKind::Apple.init_failure_message())
                })
            });

        handle.ready().await?;
        info!("✅ Sign in with Apple initialized");
        Ok(())
    }

    async fn sign_in(&self) -> AuthResult<NormalizedIdentity> {
        let apple = self.registry.apple().ok_or_else(|| {
            AuthError::OperationFailed("Sign in with Apple library is not available".to_string())
        })?;

        let response = apple
            .sign_in()
            .await
            .map_err(|e| e.into_operation_failed(ProviderKind::Apple.sign_in_failure_message()))?;

        normalize_apple_response(response, self.config().state.as_deref())
    }

    fn teardown(&self) {
        self.slot.release();
    }
}

fn normalize_apple_response(
    response: Value,
    expected_state: Option<&str>,
) -> AuthResult<NormalizedIdentity> {
    let response: AppleSignInResponse = serde_json::from_value(response)?;
    let authorization = response.authorization.ok_or_else(|| {
        AuthError::MalformedResponse("Apple response is missing authorization".to_string())
    })?;

    if let (Some(expected), Some(returned)) = (expected_state, authorization.state.as_deref()) {
        if expected != returned {
            warn!("Apple returned a state that does not match the configured one");
            return Err(AuthError::OperationFailed(
                "Apple Sign-In state mismatch".to_string(),
            ));
        }
    }

    let id_token = authorization.id_token.ok_or_else(|| {
        AuthError::MalformedResponse("Apple response is missing authorization.id_token".to_string())
    })?;
    let claims = decode_identity_claims(&id_token)?;

    let (email, name) = match response.user {
        Some(user) => (user.email, user.name.and_then(full_name)),
        None => (None, None),
    };

    IdentityParts {
        id: claims.sub,
        name,
        email: email.or(claims.email),
        id_token: Some(id_token),
        authorization_code: authorization.code,
        ..Default::default()
    }
    .normalize(ProviderKind::Apple)
}

fn full_name(name: AppleName) -> Option<String> {
    let joined = [name.first_name, name.last_name]
        .into_iter()
        .flatten()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn decode_identity_claims(id_token: &str) -> AuthResult<IdentityClaims> {
    let payload = id_token.split('.').nth(1).ok_or_else(|| {
        AuthError::MalformedResponse("Apple identity token is not a JWT".to_string())
    })?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| {
            AuthError::MalformedResponse(format!("Apple identity token payload: {}", e))
        })?;

    Ok(serde_json::from_slice(&bytes)?)
}
