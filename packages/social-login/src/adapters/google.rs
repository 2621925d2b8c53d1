// ABOUTME: Google adapter over the gapi platform library and its auth2 module
// ABOUTME: Readiness takes two hops: the platform script loads, then gapi.load("auth2") calls back

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info};

use crate::{
    adapters::{
        require_identifier, AdapterContext, IdentityParts, ProviderAdapter, ScriptSlot,
        SignOutAdapter,
    },
    bridge::callback_bridge,
    error::{AuthError, AuthResult, VendorError},
    provider::ProviderKind,
    registry::ProviderRegistry,
    script::ResourceHandle,
    types::{NormalizedIdentity, ProviderConfig},
};

/// Module requested from `gapi.load`
pub const AUTH2_MODULE: &str = "auth2";

const SIGN_OUT_FAILED: &str = "Google Sign-Out failed";

/// Parameters of `gapi.auth2.init`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleInitParams {
    pub client_id: String,
    pub scope: String,
}

/// Call surface of `window.gapi`
///
/// `sign_in` resolves with the signed-in user as
/// `{ "basicProfile": { id, name, email, imageUrl }, "authResponse": { access_token } }`.
#[async_trait(?Send)]
pub trait GoogleSdk {
    /// `gapi.load(module, callback)`
    fn load(&self, module: &str, callback: Box<dyn FnOnce()>);

    /// `gapi.auth2.init(params)`
    fn init_auth2(&self, params: GoogleInitParams) -> Result<(), VendorError>;

    /// `gapi.auth2.signIn()`
    async fn sign_in(&self) -> Result<Value, VendorError>;

    /// `gapi.auth2.signOut()`
    async fn sign_out(&self) -> Result<(), VendorError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleUserPayload {
    basic_profile: Option<BasicProfile>,
    auth_response: Option<AuthResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BasicProfile {
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: Option<String>,
}

/// OAuth popup adapter for Google Sign-In
pub struct GoogleAdapter {
    config: RefCell<ProviderConfig>,
    script_url: String,
    attributes: BTreeMap<String, String>,
    registry: Rc<dyn ProviderRegistry>,
    slot: ScriptSlot,
}

impl GoogleAdapter {
    pub fn new(context: &AdapterContext, config: ProviderConfig) -> Self {
        Self {
            config: RefCell::new(config),
            script_url: context.settings.sdk_url(ProviderKind::Google).to_string(),
            attributes: BTreeMap::new(),
            registry: context.registry.clone(),
            slot: ScriptSlot::new(context.loader.clone()),
        }
    }

    /// Current script handle, if the adapter holds one
    pub fn resource(&self) -> Option<ResourceHandle> {
        self.slot.current()
    }

    fn sdk(&self) -> AuthResult<Rc<dyn GoogleSdk>> {
        self.registry.google().ok_or_else(|| {
            AuthError::OperationFailed("Google platform library is not available".to_string())
        })
    }
}

#[async_trait(?Send)]
impl ProviderAdapter for GoogleAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn config(&self) -> ProviderConfig {
        self.config.borrow().clone()
    }

    fn reconfigure(&self, config: ProviderConfig) {
        *self.config.borrow_mut() = config;
    }

    async fn init(&self) -> AuthResult<()> {
        let config = self.config();
        require_identifier(&config, ProviderKind::Google)?;
        info!("Initializing Google Sign-In for client {}", config.identifier);

        let (module_loaded, auth2_ready) = callback_bridge::<()>("gapi.load");
        let registry = self.registry.clone();
        let handle = self
            .slot
            .acquire(&self.script_url, self.attributes.clone(), move || {
                let gapi = registry.google().ok_or_else(|| {
                    AuthError::InitializationFailed(
                        "Google platform library did not register gapi".to_string(),
                    )
                })?;
                let mut module_loaded = module_loaded;
                gapi.load(AUTH2_MODULE, Box::new(move || module_loaded(())));
                Ok(())
            });

        handle.ready().await?;
        debug!("Google platform library loaded, waiting for auth2");
        auth2_ready.settled().await?;
        handle.ensure_held()?;

        let gapi = self.registry.google().ok_or_else(|| {
            AuthError::InitializationFailed("gapi disappeared before auth2.init".to_string())
        })?;
        gapi.init_auth2(GoogleInitParams {
            client_id: config.identifier.clone(),
            scope: config.scope_for(ProviderKind::Google),
        })
        .map_err(|e| e.into_initialization_failed(ProviderKind::Google.init_failure_message()))?;

        info!("✅ Google Sign-In initialized");
        Ok(())
    }

    async fn sign_in(&self) -> AuthResult<NormalizedIdentity> {
        let gapi = self.sdk()?;
        let user = gapi
            .sign_in()
            .await
            .map_err(|e| e.into_operation_failed(ProviderKind::Google.sign_in_failure_message()))?;
        normalize_google_user(user)
    }

    fn teardown(&self) {
        self.slot.release();
    }
}

#[async_trait(?Send)]
impl SignOutAdapter for GoogleAdapter {
    async fn sign_out(&self) -> AuthResult<()> {
        let gapi = self.sdk()?;
        gapi.sign_out()
            .await
            .map_err(|e| e.into_operation_failed(SIGN_OUT_FAILED))
    }
}

fn normalize_google_user(user: Value) -> AuthResult<NormalizedIdentity> {
    let payload: GoogleUserPayload = serde_json::from_value(user)?;
    let profile = payload.basic_profile.ok_or_else(|| {
        AuthError::MalformedResponse("Google user is missing its basic profile".to_string())
    })?;

    IdentityParts {
        id: profile.id,
        name: profile.name,
        email: profile.email,
        avatar_url: profile.image_url,
        access_token: payload.auth_response.and_then(|r| r.access_token),
        ..Default::default()
    }
    .normalize(ProviderKind::Google)
}
