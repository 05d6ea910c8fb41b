//! Shared application state

use std::sync::Arc;

use crate::config::Config;
use crate::identity::IdentityVerifier;
use crate::payments::PaymentProvider;
use crate::signaling::SignalingStore;
use crate::store::Store;

/// State shared by all request handlers.
///
/// Generic over the storage backend and the two outbound providers so tests
/// can swap in an in-memory store and mock clients.
pub struct AppState<S, P, V>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    pub store: S,
    pub payments: P,
    pub identity: V,
    pub signaling: Arc<SignalingStore>,
    pub config: Config,
}

impl<S, P, V> AppState<S, P, V>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    pub fn new(store: S, payments: P, identity: V, config: Config) -> Self {
        let ttl = std::time::Duration::from_secs(config.signaling_ttl_secs);
        Self {
            store,
            payments,
            identity,
            signaling: Arc::new(SignalingStore::new(ttl)),
            config,
        }
    }
}
