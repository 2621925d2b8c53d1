// ABOUTME: Reference-counted script loader shared by provider adapters
// ABOUTME: Injects each URL once, exposes a readiness signal, and detaches on last release

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::{
    error::{AuthError, AuthResult},
    script::host::{ElementId, ScriptHost, ScriptTag},
};

/// Readiness signal of a script; every clone observes the same outcome
pub type Readiness = Shared<LocalBoxFuture<'static, AuthResult<()>>>;

/// Last observed state of a handle's readiness signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStatus {
    Pending,
    Loaded,
    Failed,
}

struct HandleInner {
    url: String,
    attributes: BTreeMap<String, String>,
    element: ElementId,
    disposed: Rc<Cell<bool>>,
    ready: Readiness,
}

/// One acquisition of an injected script
#[derive(Clone)]
pub struct ResourceHandle {
    inner: Rc<HandleInner>,
}

impl ResourceHandle {
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.inner.attributes
    }

    pub fn element(&self) -> &ElementId {
        &self.inner.element
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Error out if this handle was released
    pub fn ensure_held(&self) -> AuthResult<()> {
        if self.is_disposed() {
            return Err(released_error(self.url()));
        }
        Ok(())
    }

    /// Resolves after the script loaded and this handle's `on_ready` ran
    pub fn ready(&self) -> Readiness {
        self.inner.ready.clone()
    }

    pub fn status(&self) -> ScriptStatus {
        match self.inner.ready.peek() {
            None => ScriptStatus::Pending,
            Some(Ok(())) => ScriptStatus::Loaded,
            Some(Err(_)) => ScriptStatus::Failed,
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("url", &self.inner.url)
            .field("attributes", &self.inner.attributes)
            .field("element", &self.inner.element)
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

fn released_error(url: &str) -> AuthError {
    AuthError::InitializationFailed(format!("script handle for {} was released", url))
}

struct LoaderEntry {
    element: ElementId,
    load: Readiness,
    holders: usize,
}

/// Script loader shared by every adapter that injects into the same document
#[derive(Clone)]
pub struct ScriptLoader {
    host: Rc<dyn ScriptHost>,
    entries: Rc<RefCell<HashMap<String, LoaderEntry>>>,
}

impl ScriptLoader {
    pub fn new(host: Rc<dyn ScriptHost>) -> Self {
        Self {
            host,
            entries: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Acquire the script at `url`, injecting it only if no live entry exists
    ///
    /// `on_ready` runs once the shared load succeeded, unless the handle was
    /// released first; its error becomes the outcome of the returned handle's
    /// readiness signal. An entry whose load already failed is replaced by a
    /// fresh injection.
    pub fn acquire<F>(
        &self,
        url: &str,
        attributes: BTreeMap<String, String>,
        on_ready: F,
    ) -> ResourceHandle
    where
        F: FnOnce() -> AuthResult<()> + 'static,
    {
        if let Some(stale) = self.take_failed_entry(url) {
            debug!(
                "Replacing failed script {} ({} holders left)",
                url, stale.holders
            );
            self.host.remove(&stale.element);
        }

        let existing = self.entries.borrow_mut().get_mut(url).map(|entry| {
            entry.holders += 1;
            (entry.element.clone(), entry.load.clone(), entry.holders)
        });

        let (element, load) = match existing {
            Some((element, load, holders)) => {
                debug!("Reusing script {} ({} holders)", url, holders);
                (element, load)
            }
            None => {
                let injected = self.host.inject(ScriptTag::new(url, attributes.clone()));
                info!("Injected script {} as {}", url, injected.element);

                let failed_url = url.to_string();
                let load = injected
                    .load
                    .map(move |result| {
                        result.map_err(|reason| {
                            warn!("Script {} failed to load: {}", failed_url, reason);
                            AuthError::ResourceLoadFailed { url: failed_url }
                        })
                    })
                    .boxed_local()
                    .shared();

                self.entries.borrow_mut().insert(
                    url.to_string(),
                    LoaderEntry {
                        element: injected.element.clone(),
                        load: load.clone(),
                        holders: 1,
                    },
                );
                (injected.element, load)
            }
        };

        let disposed = Rc::new(Cell::new(false));
        let released = disposed.clone();
        let ready_url = url.to_string();
        let ready = async move {
            load.await?;
            if released.get() {
                debug!("Script handle for {} released before it loaded", ready_url);
                return Err(released_error(&ready_url));
            }
            on_ready()
        }
        .boxed_local()
        .shared();

        ResourceHandle {
            inner: Rc::new(HandleInner {
                url: url.to_string(),
                attributes,
                element,
                disposed,
                ready,
            }),
        }
    }

    /// Release a handle; the element is detached once its last holder is gone
    pub fn release(&self, handle: &ResourceHandle) {
        if handle.inner.disposed.replace(true) {
            debug!("Script handle for {} already released", handle.url());
            return;
        }

        let removed = {
            let mut entries = self.entries.borrow_mut();
            let last_holder = match entries.get_mut(handle.url()) {
                Some(entry) if entry.element == handle.inner.element => {
                    entry.holders = entry.holders.saturating_sub(1);
                    entry.holders == 0
                }
                _ => false,
            };
            if last_holder {
                entries.remove(handle.url())
            } else {
                None
            }
        };

        if let Some(entry) = removed {
            if self.host.remove(&entry.element) {
                info!("Removed script {}", handle.url());
            } else {
                debug!("Script {} was already detached", handle.url());
            }
        }
    }

    fn take_failed_entry(&self, url: &str) -> Option<LoaderEntry> {
        let mut entries = self.entries.borrow_mut();
        let failed = matches!(
            entries.get(url).and_then(|entry| entry.load.peek()),
            Some(Err(_))
        );
        if failed {
            entries.remove(url)
        } else {
            None
        }
    }

    /// Number of live handles holding the script at `url`
    pub fn holders(&self, url: &str) -> usize {
        self.entries
            .borrow()
            .get(url)
            .map(|entry| entry.holders)
            .unwrap_or(0)
    }
}
