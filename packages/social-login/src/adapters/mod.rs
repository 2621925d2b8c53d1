// ABOUTME: Provider adapter contract shared by the Google, Facebook, and Apple integrations
// ABOUTME: Each adapter wraps the script loader with vendor-specific init and response mapping

use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::{
    error::{AuthError, AuthResult},
    provider::ProviderKind,
    registry::ProviderRegistry,
    script::{ResourceHandle, ScriptHost, ScriptLoader},
    settings::SdkSettings,
    types::{non_empty, NormalizedIdentity, ProviderConfig},
};

pub mod apple;
pub mod facebook;
pub mod google;

pub use apple::AppleAdapter;
pub use facebook::FacebookAdapter;
pub use google::GoogleAdapter;

/// Vendor SDK wrapped behind the normalized sign-in contract
#[async_trait(?Send)]
pub trait ProviderAdapter {
    fn provider(&self) -> ProviderKind;

    fn config(&self) -> ProviderConfig;

    /// Swap the configuration. Callers tear the adapter down first.
    fn reconfigure(&self, config: ProviderConfig);

    /// Load the vendor script and run the vendor's init entry point
    async fn init(&self) -> AuthResult<()>;

    async fn sign_in(&self) -> AuthResult<NormalizedIdentity>;

    /// Release the script and any globals installed by `init`. Idempotent.
    fn teardown(&self);
}

/// Adapters whose vendor offers a programmatic sign-out
#[async_trait(?Send)]
pub trait SignOutAdapter: ProviderAdapter {
    async fn sign_out(&self) -> AuthResult<()>;
}

/// Collaborators every adapter is built from
#[derive(Clone)]
pub struct AdapterContext {
    pub loader: ScriptLoader,
    pub registry: Rc<dyn ProviderRegistry>,
    pub settings: SdkSettings,
}

impl AdapterContext {
    pub fn new(
        host: Rc<dyn ScriptHost>,
        registry: Rc<dyn ProviderRegistry>,
        settings: SdkSettings,
    ) -> Self {
        Self {
            loader: ScriptLoader::new(host),
            registry,
            settings,
        }
    }
}

/// The one script handle an adapter instance holds
pub(crate) struct ScriptSlot {
    loader: ScriptLoader,
    handle: RefCell<Option<ResourceHandle>>,
}

impl ScriptSlot {
    pub(crate) fn new(loader: ScriptLoader) -> Self {
        Self {
            loader,
            handle: RefCell::new(None),
        }
    }

    /// Acquire `url` and replace the held handle
    ///
    /// The new handle is taken before the old one is released, so a script
    /// that is already attached stays attached and is not injected again.
    pub(crate) fn acquire<F>(
        &self,
        url: &str,
        attributes: BTreeMap<String, String>,
        on_ready: F,
    ) -> ResourceHandle
    where
        F: FnOnce() -> AuthResult<()> + 'static,
    {
        let handle = self.loader.acquire(url, attributes, on_ready);
        if let Some(previous) = self.handle.replace(Some(handle.clone())) {
            self.loader.release(&previous);
        }
        handle
    }

    pub(crate) fn release(&self) {
        if let Some(handle) = self.handle.take() {
            self.loader.release(&handle);
        }
    }

    pub(crate) fn current(&self) -> Option<ResourceHandle> {
        self.handle.borrow().clone()
    }
}

pub(crate) fn require_identifier(config: &ProviderConfig, provider: ProviderKind) -> AuthResult<()> {
    if config.identifier.trim().is_empty() {
        return Err(AuthError::Configuration(format!(
            "{} requires a non-empty client identifier",
            provider
        )));
    }
    Ok(())
}

/// Fields every adapter extracts before building a [`NormalizedIdentity`]
#[derive(Debug, Default)]
pub(crate) struct IdentityParts {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub authorization_code: Option<String>,
}

impl IdentityParts {
    /// Only the id is required; the display name falls back to email, then id
    pub(crate) fn normalize(self, provider: ProviderKind) -> AuthResult<NormalizedIdentity> {
        let id = non_empty(self.id).ok_or_else(|| {
            AuthError::MalformedResponse(format!("{} response is missing the user id", provider))
        })?;
        let email = non_empty(self.email);
        let display_name = non_empty(self.name)
            .or_else(|| email.clone())
            .unwrap_or_else(|| id.clone());

        Ok(NormalizedIdentity {
            provider,
            id,
            display_name,
            email,
            avatar_url: non_empty(self.avatar_url),
            access_token: non_empty(self.access_token),
            id_token: non_empty(self.id_token),
            authorization_code: non_empty(self.authorization_code),
        })
    }
}
