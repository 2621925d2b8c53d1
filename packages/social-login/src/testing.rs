// ABOUTME: In-memory document and scripted vendor SDK fakes for exercising adapters without a browser
// ABOUTME: Tests decide when scripts finish loading and how each vendor call responds

use async_trait::async_trait;
use futures::future::FutureExt;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    adapters::{
        apple::{AppleInitConfig, AppleSdk},
        facebook::{FacebookInitParams, FacebookSdk},
        google::{GoogleInitParams, GoogleSdk},
    },
    bridge::VendorCallback,
    error::VendorError,
    provider::{APPLE_ID_GLOBAL, FB_ASYNC_INIT_GLOBAL, FB_GLOBAL, GAPI_GLOBAL},
    registry::{GlobalValue, ProviderRegistry},
    script::{ElementId, InjectedScript, ScriptHost, ScriptTag},
};

type LoadSender = oneshot::Sender<Result<(), String>>;

struct FakeScript {
    element: ElementId,
    tag: ScriptTag,
    attached: bool,
    pending: Option<LoadSender>,
}

/// Document whose script loads complete only when the test says so
///
/// Hooks registered with [`FakeDocument::on_execute`] run when a script for
/// that URL executes, before its load event fires, the way a vendor script
/// registers its globals.
#[derive(Default)]
pub struct FakeDocument {
    scripts: RefCell<Vec<FakeScript>>,
    hooks: RefCell<HashMap<String, Rc<dyn Fn()>>>,
}

impl FakeDocument {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Run `hook` every time the script at `url` executes
    pub fn on_execute(&self, url: &str, hook: impl Fn() + 'static) {
        self.hooks.borrow_mut().insert(url.to_string(), Rc::new(hook));
    }

    /// Execute the attached, still loading script at `url` and fire its load event
    pub fn complete_load(&self, url: &str) -> bool {
        let Some(sender) = self.take_pending(url) else {
            return false;
        };

        let hook = self.hooks.borrow().get(url).cloned();
        if let Some(hook) = hook {
            hook();
        }
        debug!("Fake script {} loaded", url);
        let _ = sender.send(Ok(()));
        true
    }

    /// Fire the error event of the attached, still loading script at `url`
    pub fn fail_load(&self, url: &str, reason: &str) -> bool {
        let Some(sender) = self.take_pending(url) else {
            return false;
        };
        let _ = sender.send(Err(reason.to_string()));
        true
    }

    /// Scripts ever injected for `url`, detached ones included
    pub fn injected_count(&self, url: &str) -> usize {
        self.scripts
            .borrow()
            .iter()
            .filter(|script| script.tag.src == url)
            .count()
    }

    pub fn attached_count(&self, url: &str) -> usize {
        self.scripts
            .borrow()
            .iter()
            .filter(|script| script.tag.src == url && script.attached)
            .count()
    }

    /// Tag of the attached script for `url`
    pub fn script(&self, url: &str) -> Option<ScriptTag> {
        self.scripts
            .borrow()
            .iter()
            .rev()
            .find(|script| script.tag.src == url && script.attached)
            .map(|script| script.tag.clone())
    }

    fn take_pending(&self, url: &str) -> Option<LoadSender> {
        self.scripts
            .borrow_mut()
            .iter_mut()
            .rev()
            .find(|script| script.tag.src == url && script.attached && script.pending.is_some())
            .and_then(|script| script.pending.take())
    }
}

impl ScriptHost for FakeDocument {
    fn inject(&self, tag: ScriptTag) -> InjectedScript {
        let element = ElementId::generate();
        let (sender, receiver) = oneshot::channel();

        self.scripts.borrow_mut().push(FakeScript {
            element: element.clone(),
            tag,
            attached: true,
            pending: Some(sender),
        });

        let load = async move {
            receiver
                .await
                .unwrap_or_else(|_| Err("script element removed before it loaded".to_string()))
        }
        .boxed_local();

        InjectedScript { element, load }
    }

    fn remove(&self, element: &ElementId) -> bool {
        let mut scripts = self.scripts.borrow_mut();
        match scripts
            .iter_mut()
            .find(|script| &script.element == element && script.attached)
        {
            Some(script) => {
                script.attached = false;
                script.pending = None;
                true
            }
            None => false,
        }
    }
}

fn count(cell: &Cell<u32>) {
    cell.set(cell.get() + 1);
}

/// Response a fake holds back until the test releases it
type Held<T> = RefCell<Option<oneshot::Receiver<Result<T, VendorError>>>>;

fn hold<T>(slot: &Held<T>) -> oneshot::Sender<Result<T, VendorError>> {
    let (sender, receiver) = oneshot::channel();
    *slot.borrow_mut() = Some(receiver);
    sender
}

async fn settle_held<T>(slot: &Held<T>, immediate: Result<T, VendorError>) -> Result<T, VendorError> {
    let held = slot.borrow_mut().take();
    match held {
        Some(receiver) => receiver
            .await
            .unwrap_or_else(|_| Err(VendorError::Thrown(Value::Null))),
        None => immediate,
    }
}

/// Scripted stand-in for `window.gapi`
pub struct FakeGoogleSdk {
    user: RefCell<Value>,
    init_error: RefCell<Option<VendorError>>,
    sign_in_error: RefCell<Option<VendorError>>,
    sign_out_error: RefCell<Option<VendorError>>,
    held_sign_in: Held<Value>,
    defer_module_load: Cell<bool>,
    pending_modules: RefCell<Vec<Box<dyn FnOnce()>>>,
    init_params: RefCell<Vec<GoogleInitParams>>,
    sign_in_calls: Cell<u32>,
    sign_out_calls: Cell<u32>,
}

impl FakeGoogleSdk {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            user: RefCell::new(Self::sample_user()),
            init_error: RefCell::new(None),
            sign_in_error: RefCell::new(None),
            sign_out_error: RefCell::new(None),
            held_sign_in: RefCell::new(None),
            defer_module_load: Cell::new(false),
            pending_modules: RefCell::new(Vec::new()),
            init_params: RefCell::new(Vec::new()),
            sign_in_calls: Cell::new(0),
            sign_out_calls: Cell::new(0),
        })
    }

    /// `GoogleUser` returned by default
    pub fn sample_user() -> Value {
        json!({
            "basicProfile": {
                "id": "108",
                "name": "Ada Lovelace",
                "email": "ada@example.com",
                "imageUrl": "https://lh3.googleusercontent.com/a/ada"
            },
            "authResponse": { "access_token": "ya29.token" }
        })
    }

    /// Register as `gapi` whenever the script at `url` executes
    pub fn serve(self: &Rc<Self>, document: &FakeDocument, registry: Rc<dyn ProviderRegistry>, url: &str) {
        let sdk = self.clone();
        document.on_execute(url, move || {
            registry.set(GAPI_GLOBAL, GlobalValue::Google(sdk.clone()));
        });
    }

    pub fn set_user(&self, user: Value) {
        *self.user.borrow_mut() = user;
    }

    pub fn fail_init(&self, error: VendorError) {
        *self.init_error.borrow_mut() = Some(error);
    }

    pub fn fail_sign_in(&self, error: VendorError) {
        *self.sign_in_error.borrow_mut() = Some(error);
    }

    pub fn fail_sign_out(&self, error: VendorError) {
        *self.sign_out_error.borrow_mut() = Some(error);
    }

    /// Keep the next `signIn()` pending until the returned sender resolves it
    pub fn hold_sign_in(&self) -> oneshot::Sender<Result<Value, VendorError>> {
        hold(&self.held_sign_in)
    }

    /// Keep `gapi.load` callbacks until [`FakeGoogleSdk::finish_module_loads`]
    pub fn defer_module_load(&self) {
        self.defer_module_load.set(true);
    }

    pub fn finish_module_loads(&self) -> usize {
        let pending: Vec<_> = self.pending_modules.borrow_mut().drain(..).collect();
        let finished = pending.len();
        for callback in pending {
            callback();
        }
        finished
    }

    pub fn init_params(&self) -> Vec<GoogleInitParams> {
        self.init_params.borrow().clone()
    }

    pub fn sign_in_calls(&self) -> u32 {
        self.sign_in_calls.get()
    }

    pub fn sign_out_calls(&self) -> u32 {
        self.sign_out_calls.get()
    }
}

#[async_trait(?Send)]
impl GoogleSdk for FakeGoogleSdk {
    fn load(&self, module: &str, callback: Box<dyn FnOnce()>) {
        debug!("gapi.load({})", module);
        if self.defer_module_load.get() {
            self.pending_modules.borrow_mut().push(callback);
        } else {
            callback();
        }
    }

    fn init_auth2(&self, params: GoogleInitParams) -> Result<(), VendorError> {
        self.init_params.borrow_mut().push(params);
        match self.init_error.borrow().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn sign_in(&self) -> Result<Value, VendorError> {
        count(&self.sign_in_calls);
        let immediate = match self.sign_in_error.borrow().clone() {
            Some(error) => Err(error),
            None => Ok(self.user.borrow().clone()),
        };
        settle_held(&self.held_sign_in, immediate).await
    }

    async fn sign_out(&self) -> Result<(), VendorError> {
        count(&self.sign_out_calls);
        match self.sign_out_error.borrow().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// How the fake `FB` answers a callback-style call
#[derive(Debug, Clone)]
pub enum CallbackBehavior {
    /// Invoke the callback once with the configured response
    Respond,
    /// Invoke the callback twice
    RespondTwice,
    /// Drop the callback without invoking it
    Drop,
    /// Keep the callback until the test answers it
    Hold,
}

/// Scripted stand-in for `window.FB`
pub struct FakeFacebookSdk {
    init_error: RefCell<Option<VendorError>>,
    login_response: RefCell<Value>,
    profile_response: RefCell<Value>,
    logout_response: RefCell<Value>,
    login_behavior: RefCell<CallbackBehavior>,
    held_login: RefCell<Option<VendorCallback<Value>>>,
    init_params: RefCell<Vec<FacebookInitParams>>,
    login_scopes: RefCell<Vec<String>>,
    api_paths: RefCell<Vec<String>>,
    logout_calls: Cell<u32>,
}

impl FakeFacebookSdk {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            init_error: RefCell::new(None),
            login_response: RefCell::new(json!({
                "status": "connected",
                "authResponse": { "accessToken": "EAAB.token", "userID": "10150" }
            })),
            profile_response: RefCell::new(Self::sample_profile()),
            logout_response: RefCell::new(json!({ "status": "unknown" })),
            login_behavior: RefCell::new(CallbackBehavior::Respond),
            held_login: RefCell::new(None),
            init_params: RefCell::new(Vec::new()),
            login_scopes: RefCell::new(Vec::new()),
            api_paths: RefCell::new(Vec::new()),
            logout_calls: Cell::new(0),
        })
    }

    pub fn sample_profile() -> Value {
        json!({
            "id": "10150",
            "name": "Grace Hopper",
            "email": "grace@example.com",
            "picture": { "data": { "url": "https://platform-lookaside.fbsbx.com/grace" } }
        })
    }

    /// Register as `FB` whenever the script at `url` executes, then call
    /// `fbAsyncInit` like the real SDK does
    pub fn serve(self: &Rc<Self>, document: &FakeDocument, registry: Rc<dyn ProviderRegistry>, url: &str) {
        let sdk = self.clone();
        document.on_execute(url, move || {
            registry.set(FB_GLOBAL, GlobalValue::Facebook(sdk.clone()));
            if let Some(async_init) = registry.callback(FB_ASYNC_INIT_GLOBAL) {
                async_init();
            }
        });
    }

    pub fn fail_init(&self, error: VendorError) {
        *self.init_error.borrow_mut() = Some(error);
    }

    pub fn set_login_response(&self, response: Value) {
        *self.login_response.borrow_mut() = response;
    }

    pub fn set_login_behavior(&self, behavior: CallbackBehavior) {
        *self.login_behavior.borrow_mut() = behavior;
    }

    /// Answer a login callback kept by [`CallbackBehavior::Hold`]
    pub fn respond_login(&self) -> bool {
        let held = self.held_login.borrow_mut().take();
        match held {
            Some(mut callback) => {
                callback(self.login_response.borrow().clone());
                true
            }
            None => false,
        }
    }

    pub fn set_profile_response(&self, response: Value) {
        *self.profile_response.borrow_mut() = response;
    }

    pub fn set_logout_response(&self, response: Value) {
        *self.logout_response.borrow_mut() = response;
    }

    pub fn init_params(&self) -> Vec<FacebookInitParams> {
        self.init_params.borrow().clone()
    }

    pub fn login_scopes(&self) -> Vec<String> {
        self.login_scopes.borrow().clone()
    }

    pub fn api_paths(&self) -> Vec<String> {
        self.api_paths.borrow().clone()
    }

    pub fn logout_calls(&self) -> u32 {
        self.logout_calls.get()
    }
}

impl FacebookSdk for FakeFacebookSdk {
    fn init(&self, params: FacebookInitParams) -> Result<(), VendorError> {
        self.init_params.borrow_mut().push(params);
        match self.init_error.borrow().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn login(&self, mut callback: VendorCallback<Value>, scope: &str) {
        self.login_scopes.borrow_mut().push(scope.to_string());
        let response = self.login_response.borrow().clone();
        let behavior = self.login_behavior.borrow().clone();

        match behavior {
            CallbackBehavior::Respond => callback(response),
            CallbackBehavior::RespondTwice => {
                callback(response.clone());
                callback(response);
            }
            CallbackBehavior::Drop => drop(callback),
            CallbackBehavior::Hold => *self.held_login.borrow_mut() = Some(callback),
        }
    }

    fn logout(&self, mut callback: VendorCallback<Value>) {
        count(&self.logout_calls);
        callback(self.logout_response.borrow().clone());
    }

    fn api(&self, path: &str, mut callback: VendorCallback<Value>) {
        self.api_paths.borrow_mut().push(path.to_string());
        callback(self.profile_response.borrow().clone());
    }
}

/// Scripted stand-in for `window.AppleID.auth`
pub struct FakeAppleSdk {
    response: RefCell<Value>,
    init_error: RefCell<Option<VendorError>>,
    sign_in_error: RefCell<Option<VendorError>>,
    held_sign_in: Held<Value>,
    init_configs: RefCell<Vec<AppleInitConfig>>,
    sign_in_calls: Cell<u32>,
}

impl FakeAppleSdk {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            response: RefCell::new(Self::sample_response()),
            init_error: RefCell::new(None),
            sign_in_error: RefCell::new(None),
            held_sign_in: RefCell::new(None),
            init_configs: RefCell::new(Vec::new()),
            sign_in_calls: Cell::new(0),
        })
    }

    /// Unsigned identity token carrying `claims`
    pub fn identity_token(claims: Value) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"fake"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.fake-signature", header, payload)
    }

    /// Response of a first-time authorization, user details included
    pub fn sample_response() -> Value {
        json!({
            "authorization": {
                "code": "c0de",
                "id_token": Self::identity_token(json!({
                    "sub": "001234.abcd",
                    "email": "relay@privaterelay.appleid.com"
                }))
            },
            "user": {
                "email": "katherine@example.com",
                "name": { "firstName": "Katherine", "lastName": "Johnson" }
            }
        })
    }

    /// Register as `AppleID` whenever the script at `url` executes
    pub fn serve(self: &Rc<Self>, document: &FakeDocument, registry: Rc<dyn ProviderRegistry>, url: &str) {
        let sdk = self.clone();
        document.on_execute(url, move || {
            registry.set(APPLE_ID_GLOBAL, GlobalValue::Apple(sdk.clone()));
        });
    }

    pub fn set_response(&self, response: Value) {
        *self.response.borrow_mut() = response;
    }

    pub fn fail_init(&self, error: VendorError) {
        *self.init_error.borrow_mut() = Some(error);
    }

    pub fn fail_sign_in(&self, error: VendorError) {
        *self.sign_in_error.borrow_mut() = Some(error);
    }

    pub fn hold_sign_in(&self) -> oneshot::Sender<Result<Value, VendorError>> {
        hold(&self.held_sign_in)
    }

    pub fn init_configs(&self) -> Vec<AppleInitConfig> {
        self.init_configs.borrow().clone()
    }

    pub fn sign_in_calls(&self) -> u32 {
        self.sign_in_calls.get()
    }
}

#[async_trait(?Send)]
impl AppleSdk for FakeAppleSdk {
    fn init(&self, config: AppleInitConfig) -> Result<(), VendorError> {
        self.init_configs.borrow_mut().push(config);
        match self.init_error.borrow().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn sign_in(&self) -> Result<Value, VendorError> {
        count(&self.sign_in_calls);
        let immediate = match self.sign_in_error.borrow().clone() {
            Some(error) => Err(error),
            None => Ok(self.response.borrow().clone()),
        };
        settle_held(&self.held_sign_in, immediate).await
    }
}
