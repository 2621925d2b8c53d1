// ABOUTME: Provider registry standing in for the document-global vendor namespace
// ABOUTME: Vendor SDKs register on it and adapters read from it instead of touching real globals

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::adapters::{apple::AppleSdk, facebook::FacebookSdk, google::GoogleSdk};
use crate::provider::ProviderKind;

/// A value living in the global namespace
#[derive(Clone)]
pub enum GlobalValue {
    Google(Rc<dyn GoogleSdk>),
    Facebook(Rc<dyn FacebookSdk>),
    Apple(Rc<dyn AppleSdk>),
    Callback(Rc<dyn Fn()>),
}

impl fmt::Debug for GlobalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google(_) => write!(f, "GlobalValue::Google"),
            Self::Facebook(_) => write!(f, "GlobalValue::Facebook"),
            Self::Apple(_) => write!(f, "GlobalValue::Apple"),
            Self::Callback(_) => write!(f, "GlobalValue::Callback"),
        }
    }
}

/// Access to the shared global namespace
pub trait ProviderRegistry {
    fn get(&self, name: &str) -> Option<GlobalValue>;
    fn set(&self, name: &str, value: GlobalValue);
    fn remove(&self, name: &str) -> Option<GlobalValue>;
}

impl dyn ProviderRegistry {
    /// `window.gapi`
    pub fn google(&self) -> Option<Rc<dyn GoogleSdk>> {
        match self.get(ProviderKind::Google.sdk_global()) {
            Some(GlobalValue::Google(sdk)) => Some(sdk),
            _ => None,
        }
    }

    /// `window.FB`
    pub fn facebook(&self) -> Option<Rc<dyn FacebookSdk>> {
        match self.get(ProviderKind::Facebook.sdk_global()) {
            Some(GlobalValue::Facebook(sdk)) => Some(sdk),
            _ => None,
        }
    }

    /// `window.AppleID`
    pub fn apple(&self) -> Option<Rc<dyn AppleSdk>> {
        match self.get(ProviderKind::Apple.sdk_global()) {
            Some(GlobalValue::Apple(sdk)) => Some(sdk),
            _ => None,
        }
    }

    pub fn callback(&self, name: &str) -> Option<Rc<dyn Fn()>> {
        match self.get(name) {
            Some(GlobalValue::Callback(callback)) => Some(callback),
            _ => None,
        }
    }
}

/// Registry backed by an in-memory map
#[derive(Default)]
pub struct InMemoryRegistry {
    globals: RefCell<HashMap<String, GlobalValue>>,
}

impl InMemoryRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.globals.borrow().contains_key(name)
    }
}

impl ProviderRegistry for InMemoryRegistry {
    fn get(&self, name: &str) -> Option<GlobalValue> {
        self.globals.borrow().get(name).cloned()
    }

    fn set(&self, name: &str, value: GlobalValue) {
        self.globals.borrow_mut().insert(name.to_string(), value);
    }

    fn remove(&self, name: &str) -> Option<GlobalValue> {
        self.globals.borrow_mut().remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::GAPI_GLOBAL;
    use std::cell::Cell;

    #[test]
    fn test_set_get_remove() {
        let registry = InMemoryRegistry::new();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();

        registry.set(
            "fbAsyncInit",
            GlobalValue::Callback(Rc::new(move || counter.set(counter.get() + 1))),
        );
        assert!(registry.contains("fbAsyncInit"));

        let registry: Rc<dyn ProviderRegistry> = registry;
        let callback = registry.callback("fbAsyncInit").unwrap();
        callback();
        assert_eq!(calls.get(), 1);

        assert!(registry.remove("fbAsyncInit").is_some());
        assert!(registry.get("fbAsyncInit").is_none());
        assert!(registry.remove("fbAsyncInit").is_none());
    }

    #[test]
    fn test_typed_lookup_ignores_mismatched_values() {
        let registry: Rc<dyn ProviderRegistry> = InMemoryRegistry::new();
        registry.set(GAPI_GLOBAL, GlobalValue::Callback(Rc::new(|| {})));

        assert!(registry.google().is_none());
        assert!(registry.callback(GAPI_GLOBAL).is_some());
    }
}
