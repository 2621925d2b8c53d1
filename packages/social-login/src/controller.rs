// ABOUTME: Session state controller driving one provider adapter through its lifecycle
// ABOUTME: Owns the observable phase and last error, serializes operations, discards late settlements

use futures::future::{self, FutureExt, LocalBoxFuture};
use std::cell::Cell;
use std::rc::Rc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    adapters::{ProviderAdapter, SignOutAdapter},
    error::{AuthError, AuthResult},
    provider::ProviderKind,
    types::{NormalizedIdentity, Phase, ProviderConfig, SessionState},
};

struct Inner<A: ProviderAdapter> {
    adapter: A,
    state: watch::Sender<SessionState>,
    epoch: Cell<u64>,
    disposed: Cell<bool>,
}

impl<A: ProviderAdapter> Inner<A> {
    fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    fn is_current(&self, epoch: u64) -> bool {
        !self.disposed.get() && self.epoch.get() == epoch
    }

    fn advance_epoch(&self) {
        self.epoch.set(self.epoch.get() + 1);
    }

    fn set_phase(&self, phase: Phase) {
        self.state.send_modify(|state| state.phase = phase);
    }

    /// Error for an operation whose session ended before it started
    fn superseded(&self) -> AuthError {
        let provider = self.adapter.provider();
        if self.disposed.get() {
            AuthError::Disposed(provider)
        } else {
            AuthError::OperationFailed(format!("{} session was reconfigured", provider))
        }
    }
}

impl<A: ProviderAdapter> Drop for Inner<A> {
    fn drop(&mut self) {
        if !self.disposed.get() {
            debug!("Last {} controller handle dropped, tearing down", self.adapter.provider());
            self.adapter.teardown();
        }
    }
}

/// An init or operation that moved the controller out of its resting phase
///
/// Settling applies the outcome to the state; dropping it unsettled puts the
/// controller back into `restore`.
struct InFlight<A: ProviderAdapter> {
    inner: Rc<Inner<A>>,
    epoch: u64,
    operation: &'static str,
    restore: Phase,
    armed: bool,
}

impl<A: ProviderAdapter> InFlight<A> {
    fn new(inner: Rc<Inner<A>>, operation: &'static str, restore: Phase) -> Self {
        let epoch = inner.epoch.get();
        Self {
            inner,
            epoch,
            operation,
            restore,
            armed: true,
        }
    }

    fn ensure_current(&mut self) -> AuthResult<()> {
        if self.inner.is_current(self.epoch) {
            return Ok(());
        }
        self.armed = false;
        Err(self.inner.superseded())
    }

    fn settle<T>(mut self, result: AuthResult<T>) -> AuthResult<T> {
        self.armed = false;
        let provider = self.inner.adapter.provider();

        if !self.inner.is_current(self.epoch) {
            debug!(
                "Discarding late {} settlement for {} session",
                self.operation, provider
            );
            return result;
        }

        match &result {
            Ok(_) => {
                info!("✅ {} {} succeeded", provider, self.operation);
                self.inner.set_phase(Phase::Ready);
            }
            Err(e) => {
                error!("{} {} failed: {}", provider, self.operation, e);
                if self.restore == Phase::Uninitialized {
                    self.inner.adapter.teardown();
                }
                let restore = self.restore;
                let recorded = e.clone();
                self.inner.state.send_modify(|state| {
                    state.phase = restore;
                    state.last_error = Some(recorded);
                });
            }
        }
        result
    }
}

impl<A: ProviderAdapter> Drop for InFlight<A> {
    fn drop(&mut self) {
        if !self.armed || !self.inner.is_current(self.epoch) {
            return;
        }
        warn!(
            "{} {} abandoned before settling",
            self.inner.adapter.provider(),
            self.operation
        );
        if self.restore == Phase::Uninitialized {
            self.inner.adapter.teardown();
        }
        self.inner.set_phase(self.restore);
    }
}

/// Lifecycle controller for one provider adapter
///
/// Clones share the same session. The adapter is torn down by `dispose`, or
/// when the last clone is dropped.
pub struct SessionController<A: ProviderAdapter> {
    inner: Rc<Inner<A>>,
}

impl<A: ProviderAdapter> Clone for SessionController<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: ProviderAdapter + 'static> SessionController<A> {
    pub fn new(adapter: A) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Rc::new(Inner {
                adapter,
                state,
                epoch: Cell::new(0),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Build a controller and start initializing it
    pub fn mount(adapter: A) -> (Self, LocalBoxFuture<'static, AuthResult<()>>) {
        let controller = Self::new(adapter);
        let init = controller.initialize();
        (controller, init)
    }

    /// Load and initialize the vendor SDK
    ///
    /// The phase becomes `Initializing` before this returns. Calling it on a
    /// ready controller resolves immediately.
    pub fn initialize(&self) -> LocalBoxFuture<'static, AuthResult<()>> {
        let inner = &self.inner;
        let provider = inner.adapter.provider();

        if inner.disposed.get() {
            return future::ready(Err(AuthError::Disposed(provider))).boxed_local();
        }
        match inner.phase() {
            Phase::Uninitialized => {}
            Phase::Initializing => {
                return future::ready(Err(AuthError::OperationInProgress(provider))).boxed_local()
            }
            Phase::Ready | Phase::Busy => return future::ready(Ok(())).boxed_local(),
        }

        info!("Initializing {} session", provider);
        inner.state.send_replace(SessionState {
            phase: Phase::Initializing,
            last_error: None,
        });

        let mut flight = InFlight::new(inner.clone(), "initialization", Phase::Uninitialized);
        async move {
            flight.ensure_current()?;
            let result = flight.inner.adapter.init().await;
            flight.settle(result)
        }
        .boxed_local()
    }

    pub fn sign_in(&self) -> LocalBoxFuture<'static, AuthResult<NormalizedIdentity>> {
        let mut flight = match self.begin("sign-in") {
            Ok(flight) => flight,
            Err(e) => return future::ready(Err(e)).boxed_local(),
        };
        async move {
            flight.ensure_current()?;
            let result = flight.inner.adapter.sign_in().await;
            flight.settle(result)
        }
        .boxed_local()
    }

    /// Tear the adapter down and stop applying pending settlements. Idempotent.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.replace(true) {
            debug!("{} controller already disposed", inner.adapter.provider());
            return;
        }

        inner.advance_epoch();
        inner.adapter.teardown();
        inner.set_phase(Phase::Uninitialized);
        info!("Disposed {} session", inner.adapter.provider());
    }

    /// Replace the provider configuration
    ///
    /// Returns `None` when nothing changed. Otherwise the current session is torn
    /// down and the returned future initializes it again with `config`.
    pub fn reconfigure(
        &self,
        config: ProviderConfig,
    ) -> Option<LocalBoxFuture<'static, AuthResult<()>>> {
        let inner = &self.inner;
        if inner.adapter.config() == config {
            debug!("{} configuration unchanged", inner.adapter.provider());
            return None;
        }

        info!("{} configuration changed, reinitializing", inner.adapter.provider());
        if !inner.disposed.get() {
            inner.advance_epoch();
            inner.adapter.teardown();
            inner.set_phase(Phase::Uninitialized);
        }
        inner.adapter.reconfigure(config);
        Some(self.initialize())
    }

    fn begin(&self, operation: &'static str) -> AuthResult<InFlight<A>> {
        let inner = &self.inner;
        let provider = inner.adapter.provider();

        match inner.phase() {
            Phase::Ready => {}
            Phase::Busy => return Err(AuthError::OperationInProgress(provider)),
            Phase::Uninitialized | Phase::Initializing => {
                return Err(AuthError::NotInitialized(provider))
            }
        }

        debug!("Starting {} {}", provider, operation);
        inner.set_phase(Phase::Busy);
        Ok(InFlight::new(inner.clone(), operation, Phase::Ready))
    }
}

impl<A: SignOutAdapter + 'static> SessionController<A> {
    pub fn sign_out(&self) -> LocalBoxFuture<'static, AuthResult<()>> {
        let mut flight = match self.begin("sign-out") {
            Ok(flight) => flight,
            Err(e) => return future::ready(Err(e)).boxed_local(),
        };
        async move {
            flight.ensure_current()?;
            let result = flight.inner.adapter.sign_out().await;
            flight.settle(result)
        }
        .boxed_local()
    }
}

impl<A: ProviderAdapter> SessionController<A> {
    pub fn provider(&self) -> ProviderKind {
        self.inner.adapter.provider()
    }

    pub fn adapter(&self) -> &A {
        &self.inner.adapter
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.borrow().is_initialized()
    }

    pub fn last_error(&self) -> Option<AuthError> {
        self.inner.state.borrow().last_error.clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}
