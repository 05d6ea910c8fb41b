//! In-memory storage implementation
//!
//! Backs the test suite and local development runs. Atomicity of
//! multi-row updates falls out of holding the relevant write lock for the
//! whole operation.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use super::{
    Account, AccountId, AccountStore, AuthSession, Booking, BookingRole, BookingStore, ChatStore,
    Goal, Interaction, InteractionStatus, MatchId, MatchStore, Message, PlatformStats, StatsStore,
    StoreResult, SwipeKind, SwipeOutcome, TokenStore, WatchSession, WatchStore,
};
use crate::crypto::generate_session_token;
use crate::error::ApiError;

/// In-memory store implementing every storage trait
#[derive(Default)]
pub struct InMemoryStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
    interactions: RwLock<HashMap<MatchId, Interaction>>,
    messages: RwLock<Vec<Message>>,
    watch_sessions: RwLock<HashMap<String, WatchSession>>,
    bookings: RwLock<HashMap<String, Booking>>,
    auth_sessions: RwLock<HashMap<String, AuthSession>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for InMemoryStore {
    fn create_account(&self, account: &Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write().unwrap();
        if accounts
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(ApiError::Conflict("Email already registered".to_string()));
        }
        if accounts.values().any(|a| a.username == account.username) {
            return Err(ApiError::Conflict("Username already taken".to_string()));
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    fn get_account(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().unwrap().get(id).cloned())
    }

    fn get_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn get_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    fn update_account(&self, account: &Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write().unwrap();
        if !accounts.contains_key(&account.id) {
            return Err(ApiError::NotFound("User"));
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    fn get_account_by_identity_session(&self, session_id: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .values()
            .find(|a| a.identity_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    fn list_accounts(
        &self,
        search: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Account>> {
        let accounts = self.accounts.read().unwrap();
        let needle = search.map(|s| s.to_lowercase());
        let mut matched: Vec<Account> = accounts
            .values()
            .filter(|a| match &needle {
                Some(n) => {
                    a.email.to_lowercase().contains(n)
                        || a.username.to_lowercase().contains(n)
                        || a.first_name
                            .as_deref()
                            .is_some_and(|f| f.to_lowercase().contains(n))
                }
                None => true,
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    fn discover(
        &self,
        actor: &Account,
        category: Goal,
        limit: usize,
    ) -> StoreResult<Vec<Account>> {
        // Anyone the actor swiped on, plus matched counterparts in either
        // direction
        let interacted: Vec<AccountId> = {
            let interactions = self.interactions.read().unwrap();
            interactions
                .values()
                .filter(|i| {
                    i.sender_id == actor.id
                        || (i.status == InteractionStatus::Matched && i.involves(&actor.id))
                })
                .map(|i| i.counterpart(&actor.id).clone())
                .collect()
        };

        let accounts = self.accounts.read().unwrap();
        let mut candidates: Vec<Account> = accounts
            .values()
            .filter(|a| a.id != actor.id)
            .filter(|a| !interacted.contains(&a.id))
            .filter(|a| a.is_active && !a.is_banned)
            .filter(|a| a.goal == category)
            .filter(|a| match actor.looking_for_gender.as_deref() {
                Some("both") | None => true,
                Some(wanted) => a.gender.as_deref() == Some(wanted),
            })
            .filter(|a| match (actor.age_min, a.age) {
                (Some(min), Some(age)) => age >= min,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|a| match (actor.age_max, a.age) {
                (Some(max), Some(age)) => age <= max,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        candidates.truncate(limit);
        Ok(candidates)
    }
}

impl MatchStore for InMemoryStore {
    fn record_swipe(
        &self,
        actor: &AccountId,
        target: &AccountId,
        kind: SwipeKind,
    ) -> StoreResult<SwipeOutcome> {
        // Single write lock covers the duplicate check and the reciprocal
        // promotion.
        let mut interactions = self.interactions.write().unwrap();

        let duplicate = interactions.values().any(|i| {
            (&i.sender_id == actor && &i.receiver_id == target)
                || (i.status == InteractionStatus::Matched
                    && i.involves(actor)
                    && i.involves(target))
        });
        if duplicate {
            return Err(ApiError::Conflict(
                "Already interacted with this user".to_string(),
            ));
        }

        // A reciprocal pending like gets promoted in place; the promoted row
        // is the single record of the match.
        if kind == SwipeKind::Like {
            let reciprocal = interactions.values_mut().find(|i| {
                &i.sender_id == target
                    && &i.receiver_id == actor
                    && i.status == InteractionStatus::Liked
            });
            if let Some(reciprocal) = reciprocal {
                reciprocal.status = InteractionStatus::Matched;
                return Ok(SwipeOutcome {
                    match_id: reciprocal.id.clone(),
                    is_match: true,
                });
            }
        }

        let interaction = Interaction {
            id: MatchId::generate(),
            sender_id: actor.clone(),
            receiver_id: target.clone(),
            status: match kind {
                SwipeKind::Like => InteractionStatus::Liked,
                SwipeKind::Pass => InteractionStatus::Passed,
            },
            created_at: Utc::now(),
        };
        let match_id = interaction.id.clone();
        interactions.insert(match_id.clone(), interaction);

        Ok(SwipeOutcome {
            match_id,
            is_match: false,
        })
    }

    fn get_interaction(&self, id: &MatchId) -> StoreResult<Option<Interaction>> {
        Ok(self.interactions.read().unwrap().get(id).cloned())
    }

    fn list_matches(&self, account: &AccountId) -> StoreResult<Vec<Interaction>> {
        let interactions = self.interactions.read().unwrap();
        let mut matches: Vec<Interaction> = interactions
            .values()
            .filter(|i| i.status == InteractionStatus::Matched && i.involves(account))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matches)
    }

    fn list_incoming_likes(&self, account: &AccountId) -> StoreResult<Vec<Interaction>> {
        let interactions = self.interactions.read().unwrap();
        let mut likes: Vec<Interaction> = interactions
            .values()
            .filter(|i| i.status == InteractionStatus::Liked && &i.receiver_id == account)
            .cloned()
            .collect();
        likes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(likes)
    }

    fn find_match_between(
        &self,
        a: &AccountId,
        b: &AccountId,
    ) -> StoreResult<Option<Interaction>> {
        Ok(self
            .interactions
            .read()
            .unwrap()
            .values()
            .find(|i| {
                i.status == InteractionStatus::Matched
                    && ((&i.sender_id == a && &i.receiver_id == b)
                        || (&i.sender_id == b && &i.receiver_id == a))
            })
            .cloned())
    }
}

impl ChatStore for InMemoryStore {
    fn create_message(&self, message: &Message) -> StoreResult<()> {
        self.messages.write().unwrap().push(message.clone());
        Ok(())
    }

    fn list_messages(&self, match_id: &MatchId) -> StoreResult<Vec<Message>> {
        let messages = self.messages.read().unwrap();
        let mut found: Vec<Message> = messages
            .iter()
            .filter(|m| &m.match_id == match_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    fn mark_messages_read(&self, match_id: &MatchId, reader: &AccountId) -> StoreResult<u64> {
        let mut messages = self.messages.write().unwrap();
        let mut changed = 0;
        for message in messages.iter_mut() {
            if &message.match_id == match_id && &message.sender_id != reader && !message.is_read {
                message.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

impl WatchStore for InMemoryStore {
    fn create_watch_session(&self, session: &WatchSession) -> StoreResult<()> {
        self.watch_sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn latest_watch_session(&self, match_id: &MatchId) -> StoreResult<Option<WatchSession>> {
        let sessions = self.watch_sessions.read().unwrap();
        Ok(sessions
            .values()
            .filter(|s| &s.match_id == match_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    fn get_watch_session(
        &self,
        id: &str,
        match_id: &MatchId,
    ) -> StoreResult<Option<WatchSession>> {
        Ok(self
            .watch_sessions
            .read()
            .unwrap()
            .get(id)
            .filter(|s| &s.match_id == match_id)
            .cloned())
    }

    fn update_watch_session(&self, session: &WatchSession) -> StoreResult<()> {
        let mut sessions = self.watch_sessions.write().unwrap();
        if !sessions.contains_key(&session.id) {
            return Err(ApiError::NotFound("Session"));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }
}

impl BookingStore for InMemoryStore {
    fn create_booking(&self, booking: &Booking) -> StoreResult<()> {
        self.bookings
            .write()
            .unwrap()
            .insert(booking.id.clone(), booking.clone());
        Ok(())
    }

    fn get_booking(&self, id: &str) -> StoreResult<Option<Booking>> {
        Ok(self.bookings.read().unwrap().get(id).cloned())
    }

    fn update_booking(&self, booking: &Booking) -> StoreResult<()> {
        let mut bookings = self.bookings.write().unwrap();
        if !bookings.contains_key(&booking.id) {
            return Err(ApiError::NotFound("Booking"));
        }
        bookings.insert(booking.id.clone(), booking.clone());
        Ok(())
    }

    fn list_bookings(&self, account: &AccountId, role: BookingRole) -> StoreResult<Vec<Booking>> {
        let bookings = self.bookings.read().unwrap();
        let mut found: Vec<Booking> = bookings
            .values()
            .filter(|b| match role {
                BookingRole::Client => &b.client_id == account,
                BookingRole::Provider => &b.provider_id == account,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

impl StatsStore for InMemoryStore {
    fn platform_stats(&self) -> StoreResult<PlatformStats> {
        let accounts = self.accounts.read().unwrap();
        let interactions = self.interactions.read().unwrap();
        let messages = self.messages.read().unwrap();

        let mut stats = PlatformStats {
            total_users: accounts.len() as u64,
            total_messages: messages.len() as u64,
            ..Default::default()
        };
        for account in accounts.values() {
            if account.is_active {
                stats.active_users += 1;
            }
            if account.is_banned {
                stats.banned_users += 1;
            }
            *stats
                .users_by_goal
                .entry(account.goal.as_str().to_string())
                .or_default() += 1;
            *stats
                .users_by_subscription
                .entry(account.subscription_plan.as_str().to_string())
                .or_default() += 1;
        }
        for interaction in interactions.values() {
            match interaction.status {
                InteractionStatus::Matched => stats.total_matches += 1,
                InteractionStatus::Liked => stats.total_likes += 1,
                InteractionStatus::Passed => {}
            }
        }
        Ok(stats)
    }
}

impl TokenStore for InMemoryStore {
    fn create_auth_session(&self, account: &AccountId) -> StoreResult<AuthSession> {
        let session = AuthSession {
            token: generate_session_token(),
            account_id: account.clone(),
            created_at: Utc::now(),
        };
        self.auth_sessions
            .write()
            .unwrap()
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    fn get_auth_session(&self, token: &str) -> StoreResult<Option<AuthSession>> {
        Ok(self.auth_sessions.read().unwrap().get(token).cloned())
    }

    fn delete_auth_session(&self, token: &str) -> StoreResult<()> {
        self.auth_sessions.write().unwrap().remove(token);
        Ok(())
    }
}
