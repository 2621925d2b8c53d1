// ABOUTME: Integration tests for the Google, Facebook, and Apple adapters
// ABOUTME: Drives each adapter against the fake document and scripted vendor SDKs

use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;

use social_login::{
    adapters::{apple::AppleInitConfig, facebook::PROFILE_PATH, google::GoogleInitParams},
    provider::FB_ASYNC_INIT_GLOBAL,
    script::{ElementId, InjectedScript, ScriptHost, ScriptTag},
    testing::{CallbackBehavior, FakeAppleSdk, FakeDocument, FakeFacebookSdk, FakeGoogleSdk},
    AdapterContext, AppleAdapter, AuthError, FacebookAdapter, GoogleAdapter, InMemoryRegistry,
    NormalizedIdentity, ProviderAdapter, ProviderConfig, ProviderKind, SdkSettings,
    SignOutAdapter, VendorError,
};
use tokio_test::{assert_pending, assert_ready, assert_ready_ok, task};

struct Harness {
    document: Rc<FakeDocument>,
    registry: Rc<InMemoryRegistry>,
    context: AdapterContext,
}

impl Harness {
    fn new() -> Self {
        let document = FakeDocument::new();
        let registry = InMemoryRegistry::new();
        let context = AdapterContext::new(document.clone(), registry.clone(), SdkSettings::default());
        Self {
            document,
            registry,
            context,
        }
    }

    fn url(&self, provider: ProviderKind) -> String {
        self.context.settings.sdk_url(provider).to_string()
    }

    fn google(&self) -> Rc<FakeGoogleSdk> {
        let sdk = FakeGoogleSdk::new();
        sdk.serve(&self.document, self.registry.clone(), &self.url(ProviderKind::Google));
        sdk
    }

    fn facebook(&self) -> Rc<FakeFacebookSdk> {
        let sdk = FakeFacebookSdk::new();
        sdk.serve(&self.document, self.registry.clone(), &self.url(ProviderKind::Facebook));
        sdk
    }

    fn apple(&self) -> Rc<FakeAppleSdk> {
        let sdk = FakeAppleSdk::new();
        sdk.serve(&self.document, self.registry.clone(), &self.url(ProviderKind::Apple));
        sdk
    }
}

/// Document that executes a script synchronously while injecting it, as a
/// browser does for a cached script
struct EagerDocument {
    inner: Rc<FakeDocument>,
    registry: Rc<InMemoryRegistry>,
    async_init_at_inject: Cell<Option<bool>>,
}

impl ScriptHost for EagerDocument {
    fn inject(&self, tag: ScriptTag) -> InjectedScript {
        self.async_init_at_inject
            .set(Some(self.registry.contains(FB_ASYNC_INIT_GLOBAL)));
        let url = tag.src.clone();
        let injected = self.inner.inject(tag);
        assert!(self.inner.complete_load(&url));
        injected
    }

    fn remove(&self, element: &ElementId) -> bool {
        self.inner.remove(element)
    }
}

/// Run `adapter.init()` while the document finishes loading the provider script
fn init_with_load<A: ProviderAdapter>(harness: &Harness, adapter: &A) -> Result<(), AuthError> {
    let mut init = task::spawn(adapter.init());
    assert_pending!(init.poll());
    assert!(harness.document.complete_load(&harness.url(adapter.provider())));
    assert_ready!(init.poll())
}

#[tokio::test]
async fn test_google_two_hop_initialization() {
    let harness = Harness::new();
    let gapi = harness.google();
    gapi.defer_module_load();
    let adapter = GoogleAdapter::new(&harness.context, ProviderConfig::new("client-1.apps"));

    let mut init = task::spawn(adapter.init());
    assert_pending!(init.poll());
    assert!(harness.document.complete_load(&harness.url(ProviderKind::Google)));

    // Script is loaded, auth2 is not
    assert_pending!(init.poll());
    assert!(gapi.init_params().is_empty());

    assert_eq!(gapi.finish_module_loads(), 1);
    assert_ready_ok!(init.poll());
    assert_eq!(
        gapi.init_params(),
        vec![GoogleInitParams {
            client_id: "client-1.apps".to_string(),
            scope: "profile email".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_google_sign_in_and_out() {
    let harness = Harness::new();
    let gapi = harness.google();
    let adapter = GoogleAdapter::new(&harness.context, ProviderConfig::new("client-1.apps"));
    init_with_load(&harness, &adapter).unwrap();

    let identity = adapter.sign_in().await.unwrap();
    assert_eq!(
        identity,
        NormalizedIdentity {
            provider: ProviderKind::Google,
            id: "108".to_string(),
            display_name: "Ada Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            avatar_url: Some("https://lh3.googleusercontent.com/a/ada".to_string()),
            access_token: Some("ya29.token".to_string()),
            id_token: None,
            authorization_code: None,
        }
    );

    adapter.sign_out().await.unwrap();
    assert_eq!(gapi.sign_out_calls(), 1);
}

#[tokio::test]
async fn test_google_thrown_values_get_default_messages() {
    let harness = Harness::new();
    let gapi = harness.google();
    let adapter = GoogleAdapter::new(&harness.context, ProviderConfig::new("client-1.apps"));
    init_with_load(&harness, &adapter).unwrap();

    gapi.fail_sign_in(VendorError::Thrown(json!({ "error": "popup_closed_by_user" })));
    assert_eq!(
        adapter.sign_in().await,
        Err(AuthError::OperationFailed("Google Sign-In failed".to_string()))
    );

    gapi.fail_sign_out(VendorError::message("network down"));
    assert_eq!(
        adapter.sign_out().await,
        Err(AuthError::OperationFailed("network down".to_string()))
    );

    gapi.fail_sign_out(VendorError::Thrown(json!(null)));
    assert_eq!(
        adapter.sign_out().await,
        Err(AuthError::OperationFailed("Google Sign-Out failed".to_string()))
    );
}

#[tokio::test]
async fn test_google_init_failure_uses_default_message() {
    let harness = Harness::new();
    let gapi = harness.google();
    gapi.fail_init(VendorError::Thrown(json!({ "error": "idpiframe_initialization_failed" })));
    let adapter = GoogleAdapter::new(&harness.context, ProviderConfig::new("client-1.apps"));

    assert_eq!(
        init_with_load(&harness, &adapter),
        Err(AuthError::InitializationFailed(
            "Failed to initialize Google Sign-In".to_string()
        ))
    );
}

#[tokio::test]
async fn test_script_without_global_fails_initialization() {
    let harness = Harness::new();
    let adapter = GoogleAdapter::new(&harness.context, ProviderConfig::new("client-1.apps"));

    assert!(matches!(
        init_with_load(&harness, &adapter),
        Err(AuthError::InitializationFailed(_))
    ));
}

#[tokio::test]
async fn test_blank_identifier_is_rejected_before_loading() {
    let harness = Harness::new();
    let adapter = GoogleAdapter::new(&harness.context, ProviderConfig::new(""));

    assert!(matches!(
        adapter.init().await,
        Err(AuthError::Configuration(_))
    ));
    assert_eq!(harness.document.injected_count(&harness.url(ProviderKind::Google)), 0);
}

#[tokio::test]
async fn test_teardown_twice_is_noop() {
    let harness = Harness::new();
    let _gapi = harness.google();
    let adapter = GoogleAdapter::new(&harness.context, ProviderConfig::new("client-1.apps"));
    init_with_load(&harness, &adapter).unwrap();
    let handle = adapter.resource().unwrap();

    adapter.teardown();
    adapter.teardown();

    assert!(handle.is_disposed());
    assert_eq!(harness.document.attached_count(&harness.url(ProviderKind::Google)), 0);
}

#[tokio::test]
async fn test_facebook_init_through_async_init() {
    let harness = Harness::new();
    let fb = harness.facebook();
    let adapter = FacebookAdapter::new(&harness.context, ProviderConfig::new("APP1"));

    let mut init = task::spawn(adapter.init());
    assert_pending!(init.poll());
    assert!(harness.registry.contains(FB_ASYNC_INIT_GLOBAL));
    assert_eq!(
        harness
            .document
            .script(&harness.url(ProviderKind::Facebook))
            .unwrap()
            .attributes["crossorigin"],
        "anonymous"
    );

    assert!(harness.document.complete_load(&harness.url(ProviderKind::Facebook)));
    assert_ready_ok!(init.poll());

    assert_eq!(fb.init_params().len(), 1);
    assert_eq!(fb.init_params()[0].app_id, "APP1");
    assert_eq!(fb.init_params()[0].version, "v18.0");
}

#[tokio::test]
async fn test_facebook_async_init_is_installed_before_injection() {
    let harness = Harness::new();
    let fb = harness.facebook();
    let document = Rc::new(EagerDocument {
        inner: harness.document.clone(),
        registry: harness.registry.clone(),
        async_init_at_inject: Cell::new(None),
    });
    let context = AdapterContext::new(document.clone(), harness.registry.clone(), SdkSettings::default());
    let adapter = FacebookAdapter::new(&context, ProviderConfig::new("APP1"));

    adapter.init().await.unwrap();

    assert_eq!(document.async_init_at_inject.get(), Some(true));
    assert_eq!(fb.init_params().len(), 1);
    assert_eq!(fb.init_params()[0].app_id, "APP1");
}

#[tokio::test]
async fn test_facebook_script_without_global_fails_initialization() {
    let harness = Harness::new();
    let adapter = FacebookAdapter::new(&harness.context, ProviderConfig::new("APP1"));

    assert_eq!(
        init_with_load(&harness, &adapter),
        Err(AuthError::InitializationFailed(
            "Facebook SDK did not register FB".to_string()
        ))
    );
}

#[tokio::test]
async fn test_facebook_version_override() {
    let harness = Harness::new();
    let fb = harness.facebook();
    let adapter = FacebookAdapter::new(&harness.context, ProviderConfig::new("APP1"))
        .with_version("v19.0");

    init_with_load(&harness, &adapter).unwrap();
    assert_eq!(fb.init_params()[0].version, "v19.0");
}

#[tokio::test]
async fn test_facebook_shared_script_runs_init_for_each_adapter() {
    let harness = Harness::new();
    let fb = harness.facebook();
    let first = FacebookAdapter::new(&harness.context, ProviderConfig::new("APP1"));
    let second = FacebookAdapter::new(&harness.context, ProviderConfig::new("APP1"));
    let url = harness.url(ProviderKind::Facebook);

    init_with_load(&harness, &first).unwrap();
    second.init().await.unwrap();

    assert_eq!(harness.document.injected_count(&url), 1);
    assert_eq!(fb.init_params().len(), 2);

    first.teardown();
    assert_eq!(harness.document.attached_count(&url), 1);
    assert!(harness.registry.contains(FB_ASYNC_INIT_GLOBAL));

    second.teardown();
    assert_eq!(harness.document.attached_count(&url), 0);
    assert!(!harness.registry.contains(FB_ASYNC_INIT_GLOBAL));
}

#[tokio::test]
async fn test_facebook_sign_in_maps_profile() {
    let harness = Harness::new();
    let fb = harness.facebook();
    let adapter = FacebookAdapter::new(
        &harness.context,
        ProviderConfig::new("APP1").with_scope("email"),
    );
    init_with_load(&harness, &adapter).unwrap();

    let identity = adapter.sign_in().await.unwrap();
    assert_eq!(
        identity,
        NormalizedIdentity {
            provider: ProviderKind::Facebook,
            id: "10150".to_string(),
            display_name: "Grace Hopper".to_string(),
            email: Some("grace@example.com".to_string()),
            avatar_url: Some("https://platform-lookaside.fbsbx.com/grace".to_string()),
            access_token: Some("EAAB.token".to_string()),
            id_token: None,
            authorization_code: None,
        }
    );
    assert_eq!(fb.login_scopes(), vec!["email".to_string()]);
    assert_eq!(fb.api_paths(), vec![PROFILE_PATH.to_string()]);
}

#[tokio::test]
async fn test_facebook_login_without_auth_response_fails() {
    let harness = Harness::new();
    let fb = harness.facebook();
    let adapter = FacebookAdapter::new(&harness.context, ProviderConfig::new("APP1"));
    init_with_load(&harness, &adapter).unwrap();

    fb.set_login_response(json!({ "status": "unknown" }));
    assert_eq!(
        adapter.sign_in().await,
        Err(AuthError::OperationFailed("Facebook login failed".to_string()))
    );
    assert!(fb.api_paths().is_empty());
}

#[tokio::test]
async fn test_facebook_profile_error_fails() {
    let harness = Harness::new();
    let fb = harness.facebook();
    let adapter = FacebookAdapter::new(&harness.context, ProviderConfig::new("APP1"));
    init_with_load(&harness, &adapter).unwrap();

    fb.set_profile_response(json!({ "error": { "message": "Invalid OAuth access token" } }));
    assert_eq!(
        adapter.sign_in().await,
        Err(AuthError::OperationFailed("Failed to fetch user data".to_string()))
    );
}

#[tokio::test]
async fn test_facebook_repeated_or_missing_callback_is_malformed() {
    let harness = Harness::new();
    let fb = harness.facebook();
    let adapter = FacebookAdapter::new(&harness.context, ProviderConfig::new("APP1"));
    init_with_load(&harness, &adapter).unwrap();

    fb.set_login_behavior(CallbackBehavior::RespondTwice);
    assert!(matches!(
        adapter.sign_in().await,
        Err(AuthError::MalformedResponse(_))
    ));

    fb.set_login_behavior(CallbackBehavior::Drop);
    assert!(matches!(
        adapter.sign_in().await,
        Err(AuthError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn test_facebook_logout_statuses() {
    let harness = Harness::new();
    let fb = harness.facebook();
    let adapter = FacebookAdapter::new(&harness.context, ProviderConfig::new("APP1"));
    init_with_load(&harness, &adapter).unwrap();

    fb.set_logout_response(json!({ "status": "unknown" }));
    assert_eq!(adapter.sign_out().await, Ok(()));

    fb.set_logout_response(json!({ "status": "not_authorized" }));
    assert_eq!(adapter.sign_out().await, Ok(()));

    fb.set_logout_response(json!({ "status": "connected" }));
    assert_eq!(
        adapter.sign_out().await,
        Err(AuthError::OperationFailed(
            "Facebook logout failed (status: connected)".to_string()
        ))
    );
}

#[tokio::test]
async fn test_facebook_init_error_without_message() {
    let harness = Harness::new();
    let fb = harness.facebook();
    fb.fail_init(VendorError::Thrown(json!(null)));
    let adapter = FacebookAdapter::new(&harness.context, ProviderConfig::new("APP1"));

    assert_eq!(
        init_with_load(&harness, &adapter),
        Err(AuthError::InitializationFailed(
            "Failed to initialize Facebook SDK".to_string()
        ))
    );
}

#[tokio::test]
async fn test_apple_init_passes_options() {
    let harness = Harness::new();
    let apple = harness.apple();
    let adapter = AppleAdapter::new(
        &harness.context,
        ProviderConfig::new("com.example.web")
            .with_redirect_target("https://example.com/auth/apple")
            .with_state("s1")
            .with_popup(true),
    );

    init_with_load(&harness, &adapter).unwrap();
    assert_eq!(
        apple.init_configs(),
        vec![AppleInitConfig {
            client_id: "com.example.web".to_string(),
            scope: "name email".to_string(),
            redirect_uri: Some("https://example.com/auth/apple".to_string()),
            state: Some("s1".to_string()),
            use_popup: true,
        }]
    );
}

#[tokio::test]
async fn test_apple_sign_in_maps_authorization() {
    let harness = Harness::new();
    let _apple = harness.apple();
    let adapter = AppleAdapter::new(&harness.context, ProviderConfig::new("com.example.web"));
    init_with_load(&harness, &adapter).unwrap();

    let identity = adapter.sign_in().await.unwrap();
    assert_eq!(identity.provider, ProviderKind::Apple);
    assert_eq!(identity.id, "001234.abcd");
    assert_eq!(identity.display_name, "Katherine Johnson");
    assert_eq!(identity.email.as_deref(), Some("katherine@example.com"));
    assert_eq!(identity.authorization_code.as_deref(), Some("c0de"));
    assert!(identity.id_token.is_some());
    assert_eq!(identity.access_token, None);
}

#[tokio::test]
async fn test_apple_sign_in_failure_defaults() {
    let harness = Harness::new();
    let apple = harness.apple();
    let adapter = AppleAdapter::new(&harness.context, ProviderConfig::new("com.example.web"));
    init_with_load(&harness, &adapter).unwrap();

    apple.fail_sign_in(VendorError::Thrown(json!({ "error": "popup_closed_by_user" })));
    assert_eq!(
        adapter.sign_in().await,
        Err(AuthError::OperationFailed("Apple Sign-In failed".to_string()))
    );
}
