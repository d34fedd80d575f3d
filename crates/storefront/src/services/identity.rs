//! Shopper identity.
//!
//! The cart manager only needs to know who the current shopper is and when
//! that changes. [`IdentityProvider`] is that seam; [`SessionIdentity`] is a
//! process-local implementation driven by explicit sign-in and sign-out
//! calls.

use tokio::sync::watch;
use tracing::info;

use cartwheel_core::UserId;

use crate::error::{clear_sentry_user, set_sentry_user};

/// Supplies the current shopper identity and notifies on change.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, or `None` for an anonymous shopper.
    fn current_identity(&self) -> Option<UserId>;

    /// A receiver that observes every sign-in and sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<UserId>>;
}

/// Identity held in process memory.
#[derive(Debug)]
pub struct SessionIdentity {
    current: watch::Sender<Option<UserId>>,
}

impl SessionIdentity {
    #[must_use]
    pub fn new(initial: Option<UserId>) -> Self {
        let (current, _) = watch::channel(initial);
        Self { current }
    }

    /// Mark `user_id` as signed in.
    pub fn sign_in(&self, user_id: UserId) {
        set_sentry_user(&user_id, None);
        let previous = self.current.send_replace(Some(user_id));
        info!(user_id = %user_id, previous = ?previous, "Shopper signed in");
    }

    /// Return to an anonymous session.
    pub fn sign_out(&self) {
        clear_sentry_user();
        if let Some(previous) = self.current.send_replace(None) {
            info!(user_id = %previous, "Shopper signed out");
        }
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new(None)
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_identity(&self) -> Option<UserId> {
        *self.current.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.current.subscribe()
    }
}
