//! Storage abstractions
//!
//! Sync trait-per-concern stores with an in-memory implementation for
//! tests/development and a SQLite implementation for deployment. The
//! duplicate check and mutual-match promotion happen inside a single store
//! call so two concurrent likes cannot race into an inconsistent state.

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use crate::error::ApiError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, ApiError>;

/// Account identity, profile, and verification state
pub trait AccountStore: Send + Sync {
    /// Insert a new account; fails with Conflict when the email or
    /// username is already taken.
    fn create_account(&self, account: &Account) -> StoreResult<()>;

    fn get_account(&self, id: &AccountId) -> StoreResult<Option<Account>>;

    fn get_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    fn get_account_by_username(&self, username: &str) -> StoreResult<Option<Account>>;

    /// Replace the stored row for an account
    fn update_account(&self, account: &Account) -> StoreResult<()>;

    /// Look up the account owning an identity verification session
    fn get_account_by_identity_session(&self, session_id: &str) -> StoreResult<Option<Account>>;

    /// Paged account listing with optional substring search on email,
    /// username, or first name (admin)
    fn list_accounts(
        &self,
        search: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Account>>;

    /// Candidate accounts for discovery: active, not banned, matching the
    /// goal category, not the actor, and not already interacted with by the
    /// actor. Gender and age filters apply when set on the actor.
    fn discover(&self, actor: &Account, category: Goal, limit: usize)
        -> StoreResult<Vec<Account>>;
}

/// Directed like/pass edges and mutual-match promotion
pub trait MatchStore: Send + Sync {
    /// Record a swipe. Fails with Conflict when the actor already swiped on
    /// the target, or the pair is already matched. On a like with a
    /// reciprocal pending like, the reciprocal row is promoted to matched in
    /// place and its id is returned with `is_match` set; the promoted row is
    /// the single record of the match.
    fn record_swipe(
        &self,
        actor: &AccountId,
        target: &AccountId,
        kind: SwipeKind,
    ) -> StoreResult<SwipeOutcome>;

    fn get_interaction(&self, id: &MatchId) -> StoreResult<Option<Interaction>>;

    /// Interactions with status matched where the account is either side
    fn list_matches(&self, account: &AccountId) -> StoreResult<Vec<Interaction>>;

    /// Pending admirers: interactions where the account is the receiver and
    /// status is still liked
    fn list_incoming_likes(&self, account: &AccountId) -> StoreResult<Vec<Interaction>>;

    /// Matched interaction between two accounts in either direction, if any
    fn find_match_between(
        &self,
        a: &AccountId,
        b: &AccountId,
    ) -> StoreResult<Option<Interaction>>;
}

/// Chat messages scoped to a matched pair
pub trait ChatStore: Send + Sync {
    fn create_message(&self, message: &Message) -> StoreResult<()>;

    /// All messages for a match, oldest first
    fn list_messages(&self, match_id: &MatchId) -> StoreResult<Vec<Message>>;

    /// Mark every message not sent by `reader` as read; returns how many
    /// rows changed
    fn mark_messages_read(&self, match_id: &MatchId, reader: &AccountId) -> StoreResult<u64>;
}

/// Watch-together playback sessions
pub trait WatchStore: Send + Sync {
    fn create_watch_session(&self, session: &WatchSession) -> StoreResult<()>;

    /// Most recently created session for a match
    fn latest_watch_session(&self, match_id: &MatchId) -> StoreResult<Option<WatchSession>>;

    fn get_watch_session(
        &self,
        id: &str,
        match_id: &MatchId,
    ) -> StoreResult<Option<WatchSession>>;

    fn update_watch_session(&self, session: &WatchSession) -> StoreResult<()>;
}

/// Bookings and their payment lifecycle
pub trait BookingStore: Send + Sync {
    fn create_booking(&self, booking: &Booking) -> StoreResult<()>;

    fn get_booking(&self, id: &str) -> StoreResult<Option<Booking>>;

    fn update_booking(&self, booking: &Booking) -> StoreResult<()>;

    /// Bookings where the account plays the given role, newest first
    fn list_bookings(&self, account: &AccountId, role: BookingRole) -> StoreResult<Vec<Booking>>;
}

/// Platform-wide counters (admin)
pub trait StatsStore: Send + Sync {
    /// User, match, like, and message totals with per-goal and
    /// per-subscription breakdowns
    fn platform_stats(&self) -> StoreResult<PlatformStats>;
}

/// Opaque cookie-session tokens
pub trait TokenStore: Send + Sync {
    fn create_auth_session(&self, account: &AccountId) -> StoreResult<AuthSession>;

    fn get_auth_session(&self, token: &str) -> StoreResult<Option<AuthSession>>;

    fn delete_auth_session(&self, token: &str) -> StoreResult<()>;
}

/// Everything the application state needs from a storage backend
pub trait Store:
    AccountStore + MatchStore + ChatStore + WatchStore + BookingStore + StatsStore + TokenStore
{
}

impl<T> Store for T where
    T: AccountStore + MatchStore + ChatStore + WatchStore + BookingStore + StatsStore + TokenStore
{
}

// Forwarding impls so a shared `Arc<store>` can back the application state
// while tests keep a handle to seed and inspect data directly.

impl<T: AccountStore + ?Sized> AccountStore for std::sync::Arc<T> {
    fn create_account(&self, account: &Account) -> StoreResult<()> {
        (**self).create_account(account)
    }

    fn get_account(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        (**self).get_account(id)
    }

    fn get_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        (**self).get_account_by_email(email)
    }

    fn get_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        (**self).get_account_by_username(username)
    }

    fn update_account(&self, account: &Account) -> StoreResult<()> {
        (**self).update_account(account)
    }

    fn get_account_by_identity_session(&self, session_id: &str) -> StoreResult<Option<Account>> {
        (**self).get_account_by_identity_session(session_id)
    }

    fn list_accounts(
        &self,
        search: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Account>> {
        (**self).list_accounts(search, limit, offset)
    }

    fn discover(
        &self,
        actor: &Account,
        category: Goal,
        limit: usize,
    ) -> StoreResult<Vec<Account>> {
        (**self).discover(actor, category, limit)
    }
}

impl<T: MatchStore + ?Sized> MatchStore for std::sync::Arc<T> {
    fn record_swipe(
        &self,
        actor: &AccountId,
        target: &AccountId,
        kind: SwipeKind,
    ) -> StoreResult<SwipeOutcome> {
        (**self).record_swipe(actor, target, kind)
    }

    fn get_interaction(&self, id: &MatchId) -> StoreResult<Option<Interaction>> {
        (**self).get_interaction(id)
    }

    fn list_matches(&self, account: &AccountId) -> StoreResult<Vec<Interaction>> {
        (**self).list_matches(account)
    }

    fn list_incoming_likes(&self, account: &AccountId) -> StoreResult<Vec<Interaction>> {
        (**self).list_incoming_likes(account)
    }

    fn find_match_between(
        &self,
        a: &AccountId,
        b: &AccountId,
    ) -> StoreResult<Option<Interaction>> {
        (**self).find_match_between(a, b)
    }
}

impl<T: ChatStore + ?Sized> ChatStore for std::sync::Arc<T> {
    fn create_message(&self, message: &Message) -> StoreResult<()> {
        (**self).create_message(message)
    }

    fn list_messages(&self, match_id: &MatchId) -> StoreResult<Vec<Message>> {
        (**self).list_messages(match_id)
    }

    fn mark_messages_read(&self, match_id: &MatchId, reader: &AccountId) -> StoreResult<u64> {
        (**self).mark_messages_read(match_id, reader)
    }
}

impl<T: WatchStore + ?Sized> WatchStore for std::sync::Arc<T> {
    fn create_watch_session(&self, session: &WatchSession) -> StoreResult<()> {
        (**self).create_watch_session(session)
    }

    fn latest_watch_session(&self, match_id: &MatchId) -> StoreResult<Option<WatchSession>> {
        (**self).latest_watch_session(match_id)
    }

    fn get_watch_session(
        &self,
        id: &str,
        match_id: &MatchId,
    ) -> StoreResult<Option<WatchSession>> {
        (**self).get_watch_session(id, match_id)
    }

    fn update_watch_session(&self, session: &WatchSession) -> StoreResult<()> {
        (**self).update_watch_session(session)
    }
}

impl<T: BookingStore + ?Sized> BookingStore for std::sync::Arc<T> {
    fn create_booking(&self, booking: &Booking) -> StoreResult<()> {
        (**self).create_booking(booking)
    }

    fn get_booking(&self, id: &str) -> StoreResult<Option<Booking>> {
        (**self).get_booking(id)
    }

    fn update_booking(&self, booking: &Booking) -> StoreResult<()> {
        (**self).update_booking(booking)
    }

    fn list_bookings(&self, account: &AccountId, role: BookingRole) -> StoreResult<Vec<Booking>> {
        (**self).list_bookings(account, role)
    }
}

impl<T: StatsStore + ?Sized> StatsStore for std::sync::Arc<T> {
    fn platform_stats(&self) -> StoreResult<PlatformStats> {
        (**self).platform_stats()
    }
}

impl<T: TokenStore + ?Sized> TokenStore for std::sync::Arc<T> {
    fn create_auth_session(&self, account: &AccountId) -> StoreResult<AuthSession> {
        (**self).create_auth_session(account)
    }

    fn get_auth_session(&self, token: &str) -> StoreResult<Option<AuthSession>> {
        (**self).get_auth_session(token)
    }

    fn delete_auth_session(&self, token: &str) -> StoreResult<()> {
        (**self).delete_auth_session(token)
    }
}
