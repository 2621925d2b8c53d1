// ABOUTME: External script resource loading for vendor SDKs
// ABOUTME: Abstracts the document behind ScriptHost and tracks injected scripts per URL

pub mod host;
pub mod loader;

pub use host::{ElementId, InjectedScript, ScriptHost, ScriptTag};
pub use loader::{Readiness, ResourceHandle, ScriptLoader, ScriptStatus};
