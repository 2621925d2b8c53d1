// ABOUTME: Single-resolution bridge from vendor callback APIs to futures
// ABOUTME: Guarantees one settlement per operation and flags repeated or missing callbacks

use std::cell::Cell;
use std::rc::Rc;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{AuthError, AuthResult};

/// Callback handed to a vendor API
pub type VendorCallback<T> = Box<dyn FnMut(T)>;

/// Receiving side of a [`callback_bridge`]
pub struct CallbackBridge<T> {
    operation: &'static str,
    receiver: oneshot::Receiver<T>,
    calls: Rc<Cell<u32>>,
}

/// Create a callback for `operation` and the bridge that settles with its first value
pub fn callback_bridge<T: 'static>(operation: &'static str) -> (VendorCallback<T>, CallbackBridge<T>) {
    let (sender, receiver) = oneshot::channel();
    let mut sender = Some(sender);
    let calls = Rc::new(Cell::new(0u32));
    let counter = calls.clone();

    let callback: VendorCallback<T> = Box::new(move |value: T| {
        counter.set(counter.get() + 1);
        match sender.take() {
            Some(sender) => {
                // Receiver gone means the operation was abandoned
                let _ = sender.send(value);
            }
            None => warn!(
                "{} callback invoked {} times, ignoring repeated value",
                operation,
                counter.get()
            ),
        }
    });

    (
        callback,
        CallbackBridge {
            operation,
            receiver,
            calls,
        },
    )
}

impl<T> CallbackBridge<T> {
    /// Wait for the vendor callback
    ///
    /// Fails with `MalformedResponse` if the callback was dropped without being
    /// invoked, or invoked more than once before the value was consumed.
    pub async fn settled(self) -> AuthResult<T> {
        let value = self.receiver.await.map_err(|_| {
            AuthError::MalformedResponse(format!(
                "{} callback was dropped without being invoked",
                self.operation
            ))
        })?;

        let calls = self.calls.get();
        if calls > 1 {
            return Err(AuthError::MalformedResponse(format!(
                "{} callback invoked {} times",
                self.operation, calls
            )));
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_invocation_resolves() {
        let (mut callback, bridge) = callback_bridge::<u32>("FB.login");
        callback(7);
        assert_eq!(bridge.settled().await, Ok(7));
    }

    #[tokio::test]
    async fn test_repeated_invocation_is_malformed() {
        let (mut callback, bridge) = callback_bridge::<u32>("FB.login");
        callback(1);
        callback(2);
        assert!(matches!(
            bridge.settled().await,
            Err(AuthError::MalformedResponse(msg)) if msg.contains("2 times")
        ));
    }

    #[tokio::test]
    async fn test_dropped_callback_is_malformed() {
        let (callback, bridge) = callback_bridge::<u32>("FB.logout");
        drop(callback);
        assert!(matches!(
            bridge.settled().await,
            Err(AuthError::MalformedResponse(msg)) if msg.contains("FB.logout")
        ));
    }

    #[test]
    fn test_callback_after_bridge_dropped_does_not_panic() {
        let (mut callback, bridge) = callback_bridge::<u32>("gapi.load");
        drop(bridge);
        callback(1);
        callback(2);
    }
}
