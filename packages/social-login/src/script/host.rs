// ABOUTME: Document abstraction used to inject and remove script elements
// ABOUTME: Lets the loader run against a browser document or an in-memory fake

use futures::future::LocalBoxFuture;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of one injected script element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(String);

impl ElementId {
    pub fn generate() -> Self {
        Self(format!("script-{}", nanoid::nanoid!(10)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `<script>` element to append to the document head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTag {
    pub src: String,
    pub is_async: bool,
    pub defer: bool,
    pub attributes: BTreeMap<String, String>,
}

impl ScriptTag {
    /// Script loaded with `async` and `defer` set, like every vendor snippet
    pub fn new(src: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            src: src.into(),
            is_async: true,
            defer: true,
            attributes,
        }
    }
}

/// An element appended by a [`ScriptHost`] together with its load outcome
///
/// `load` resolves once the script has executed, or fails with a reason when
/// the element errors or is removed before loading.
pub struct InjectedScript {
    pub element: ElementId,
    pub load: LocalBoxFuture<'static, Result<(), String>>,
}

/// The document the vendor scripts are injected into
#[cfg_attr(test, mockall::automock)]
pub trait ScriptHost {
    /// Append the script element and start loading it
    fn inject(&self, tag: ScriptTag) -> InjectedScript;

    /// Detach the element; returns false if it was no longer attached
    fn remove(&self, element: &ElementId) -> bool;
}
