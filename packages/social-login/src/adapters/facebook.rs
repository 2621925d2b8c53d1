// ABOUTME: Facebook adapter over the JS SDK and its fbAsyncInit self-invoked callback
// ABOUTME: Wraps FB.login, FB.api, and FB.logout callbacks into single-settlement futures

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::{
    adapters::{
        require_identifier, AdapterContext, IdentityParts, ProviderAdapter, ScriptSlot,
        SignOutAdapter,
    },
    bridge::{callback_bridge, VendorCallback},
    error::{AuthError, AuthResult, VendorError},
    provider::{ProviderKind, FB_ASYNC_INIT_GLOBAL},
    registry::{GlobalValue, ProviderRegistry},
    script::ResourceHandle,
    types::{NormalizedIdentity, ProviderConfig},
};

/// Graph API path requested after login
pub const PROFILE_PATH: &str = "/me?fields=id,name,email,picture";

/// Login statuses that mean no app session remains
const SIGNED_OUT_STATUSES: &[&str] = &["unknown", "not_authorized"];

/// Parameters of `FB.init`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacebookInitParams {
    pub app_id: String,
    pub version: String,
}

/// Call surface of `window.FB`; every response is the SDK's plain JS object
pub trait FacebookSdk {
    /// `FB.init(params)`
    fn init(&self, params: FacebookInitParams) -> Result<(), VendorError>;

    /// `FB.login(callback, { scope })`
    fn login(&self, callback: VendorCallback<Value>, scope: &str);

    /// `FB.logout(callback)`
    fn logout(&self, callback: VendorCallback<Value>);

    /// `FB.api(path, callback)`
    fn api(&self, path: &str, callback: VendorCallback<Value>);
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    auth_response: Option<LoginAuthResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginAuthResponse {
    access_token: Option<String>,
    #[serde(rename = "userID")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
    picture: Option<Picture>,
}

#[derive(Debug, Deserialize)]
struct Picture {
    data: Option<PictureData>,
}

#[derive(Debug, Deserialize)]
struct PictureData {
    url: Option<String>,
}

/// App SDK adapter for Facebook Login
pub struct FacebookAdapter {
    config: RefCell<ProviderConfig>,
    script_url: String,
    version: String,
    attributes: BTreeMap<String, String>,
    registry: Rc<dyn ProviderRegistry>,
    slot: ScriptSlot,
    async_init: RefCell<Option<Rc<dyn Fn()>>>,
}

impl FacebookAdapter {
    pub fn new(context: &AdapterContext, config: ProviderConfig) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("crossorigin".to_string(), "anonymous".to_string());

        Self {
            config: RefCell::new(config),
            script_url: context.settings.sdk_url(ProviderKind::Facebook).to_string(),
            version: context.settings.facebook_sdk_version.clone(),
            attributes,
            registry: context.registry.clone(),
            slot: ScriptSlot::new(context.loader.clone()),
            async_init: RefCell::new(None),
        }
    }

    /// Override the Graph API version passed to `FB.init`
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn resource(&self) -> Option<ResourceHandle> {
        self.slot.current()
    }

    fn sdk(&self) -> AuthResult<Rc<dyn FacebookSdk>> {
        self.registry.facebook().ok_or_else(|| {
            AuthError::OperationFailed("Facebook SDK is not available".to_string())
        })
    }

    /// Build the `fbAsyncInit` routine; it runs `FB.init` at most once
    fn async_init_routine(
        &self,
        params: FacebookInitParams,
        settle: VendorCallback<AuthResult<()>>,
    ) -> Rc<dyn Fn()> {
        let registry = self.registry.clone();
        let fired = Cell::new(false);
        let settle = RefCell::new(settle);

        Rc::new(move || {
            if fired.replace(true) {
                debug!("fbAsyncInit already ran for app {}", params.app_id);
                return;
            }

            let result = match registry.facebook() {
                Some(fb) => fb.init(params.clone()).map_err(|e| {
                    e.into_initialization_failed(ProviderKind::Facebook.init_failure_message())
                }),
                None => Err(AuthError::InitializationFailed(
                    "Facebook SDK did not register FB".to_string(),
                )),
            };
            let mut settle = settle.borrow_mut();
            (*settle)(result);
        })
    }

    fn remove_async_init(&self) {
        let Some(installed) = self.async_init.borrow_mut().take() else {
            return;
        };

        // Another adapter may have installed its own routine since
        match self.registry.callback(FB_ASYNC_INIT_GLOBAL) {
            Some(current) if Rc::ptr_eq(&current, &installed) => {
                self.registry.remove(FB_ASYNC_INIT_GLOBAL);
                debug!("Removed fbAsyncInit");
            }
            _ => {}
        }
    }
}

#[async_trait(?Send)]
impl ProviderAdapter for FacebookAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Facebook
    }

    fn config(&self) -> ProviderConfig {
        self.config.borrow().clone()
    }

    fn reconfigure(&self, config: ProviderConfig) {
        *self.config.borrow_mut() = config;
    }

    async fn init(&self) -> AuthResult<()> {
        let config = self.config();
        require_identifier(&config, ProviderKind::Facebook)?;
        info!("Initializing Facebook SDK for app {}", config.identifier);

        let (settle, initialized) = callback_bridge::<AuthResult<()>>(FB_ASYNC_INIT_GLOBAL);
        let routine = self.async_init_routine(
            FacebookInitParams {
                app_id: config.identifier.clone(),
                version: self.version.clone(),
            },
            settle,
        );

        // The SDK calls fbAsyncInit as soon as it executes, so it must exist before injection
        self.registry
            .set(FB_ASYNC_INIT_GLOBAL, GlobalValue::Callback(routine.clone()));
        *self.async_init.borrow_mut() = Some(routine.clone());

        let handle = self
            .slot
            .acquire(&self.script_url, self.attributes.clone(), move || {
                // A script shared with another holder has already executed and
                // will not call fbAsyncInit again; a script that never
                // registered FB settles the routine with an error
                routine();
                Ok(())
            });

        handle.ready().await?;
        initialized.settled().await??;
        handle.ensure_held()?;

        info!("✅ Facebook SDK initialized");
        Ok(())
    }

    async fn sign_in(&self) -> AuthResult<NormalizedIdentity> {
        let fb = self.sdk()?;
        let scope = self.config().scope_for(ProviderKind::Facebook);

        let (callback, login) = callback_bridge::<Value>("FB.login");
        fb.login(callback, &scope);
        let login: LoginResponse = serde_json::from_value(login.settled().await?)?;
        let auth = login.auth_response.ok_or_else(|| {
            AuthError::OperationFailed("Facebook login failed".to_string())
        })?;

        let (callback, profile) = callback_bridge::<Value>("FB.api");
        fb.api(PROFILE_PATH, callback);
        let profile = profile.settled().await?;
        if profile.is_null() || profile.get("error").is_some() {
            warn!("Facebook profile request failed");
            return Err(AuthError::OperationFailed(
                "Failed to fetch user data".to_string(),
            ));
        }
        let profile: FacebookProfile = serde_json::from_value(profile)?;

        IdentityParts {
            id: profile.id.or(auth.user_id),
            name: profile.name,
            email: profile.email,
            avatar_url: profile.picture.and_then(|p| p.data).and_then(|d| d.url),
            access_token: auth.access_token,
            ..Default::default()
        }
        .normalize(ProviderKind::Facebook)
    }

    fn teardown(&self) {
        self.slot.release();
        self.remove_async_init();
    }
}

#[async_trait(?Send)]
impl SignOutAdapter for FacebookAdapter {
    async fn sign_out(&self) -> AuthResult<()> {
        let fb = self.sdk()?;

        let (callback, logout) = callback_bridge::<Value>("FB.logout");
        fb.logout(callback);
        let response = logout.settled().await?;

        match response.get("status").and_then(Value::as_str) {
            Some(status) if SIGNED_OUT_STATUSES.contains(&status) => {
                debug!("Facebook reported status {} after logout", status);
                Ok(())
            }
            status => Err(AuthError::OperationFailed(format!(
                "Facebook logout failed (status: {})",
                status.unwrap_or("missing")
            ))),
        }
    }
}
