// ABOUTME: Social sign-in session library driving script-loaded vendor SDKs
// ABOUTME: Supports Google, Facebook, and Apple with shared script loading and observable session state

pub mod adapters;
pub mod bridge;
pub mod controller;
pub mod error;
pub mod provider;
pub mod registry;
pub mod script;
pub mod settings;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod types;

// Re-export main types
pub use adapters::{
    AdapterContext, AppleAdapter, FacebookAdapter, GoogleAdapter, ProviderAdapter, SignOutAdapter,
};
pub use controller::SessionController;
pub use error::{AuthError, AuthResult, VendorError};
pub use provider::ProviderKind;
pub use registry::{GlobalValue, InMemoryRegistry, ProviderRegistry};
pub use script::{ResourceHandle, ScriptHost, ScriptLoader, ScriptStatus};
pub use settings::SdkSettings;
pub use types::{NormalizedIdentity, Phase, ProviderConfig, SessionState};
