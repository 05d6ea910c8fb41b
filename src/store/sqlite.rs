//! SQLite-based storage implementation

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    Account, AccountId, AccountStore, AuthSession, Booking, BookingRole, BookingStatus,
    BookingStore, ChatStore, Goal, Interaction, InteractionStatus, MatchId, MatchStore, Message,
    PaymentStatus, PlatformStats, StatsStore, StoreResult, SubscriptionPlan, SwipeKind,
    SwipeOutcome, TokenStore, VerificationStatus, WatchSession, WatchStatus, WatchStore,
};
use crate::crypto::generate_session_token;
use crate::error::ApiError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite store implementing every storage trait
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn internal(e: impl ToString) -> ApiError {
    ApiError::Internal(e.to_string())
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|v| {
        DateTime::parse_from_rfc3339(&v)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, ApiError> {
        let conn = Connection::open(path).map_err(internal)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(internal)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (used by store-level tests)
    pub fn open_in_memory() -> Result<Self, ApiError> {
        let conn = Connection::open_in_memory().map_err(internal)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(internal)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<(), ApiError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(internal)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    fn get_schema_version(conn: &Connection) -> Result<i32, ApiError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(internal)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(internal)
    }

    fn migrate_v1(conn: &Connection) -> Result<(), ApiError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                first_name TEXT,
                last_name TEXT,
                age INTEGER,
                gender TEXT,
                city TEXT,
                bio TEXT,
                photos TEXT NOT NULL DEFAULT '[]',
                goal TEXT NOT NULL,
                subscription_plan TEXT NOT NULL DEFAULT 'free',
                looking_for_gender TEXT,
                age_min INTEGER,
                age_max INTEGER,
                is_service_provider INTEGER NOT NULL DEFAULT 0,
                service_verified INTEGER NOT NULL DEFAULT 0,
                business_name TEXT,
                provider_stripe_key TEXT,
                stripe_account_id TEXT,
                hourly_rate REAL,
                trust_score INTEGER NOT NULL DEFAULT 50,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_banned INTEGER NOT NULL DEFAULT 0,
                banned_reason TEXT,
                is_admin INTEGER NOT NULL DEFAULT 0,
                identity_verified INTEGER NOT NULL DEFAULT 0,
                identity_verification_status TEXT NOT NULL DEFAULT 'unverified',
                identity_session_id TEXT,
                identity_verified_at TEXT,
                identity_document_type TEXT,
                identity_age_verified INTEGER NOT NULL DEFAULT 0,
                verification_attempts INTEGER NOT NULL DEFAULT 0,
                last_verification_attempt TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_active TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_accounts_identity_session
                ON accounts(identity_session_id);

            CREATE TABLE IF NOT EXISTS interactions (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL REFERENCES accounts(id),
                receiver_id TEXT NOT NULL REFERENCES accounts(id),
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (sender_id, receiver_id)
            );
            CREATE INDEX IF NOT EXISTS idx_interactions_receiver
                ON interactions(receiver_id, status);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                match_id TEXT NOT NULL REFERENCES interactions(id),
                sender_id TEXT NOT NULL REFERENCES accounts(id),
                body TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_match ON messages(match_id);

            CREATE TABLE IF NOT EXISTS watch_sessions (
                id TEXT PRIMARY KEY,
                match_id TEXT NOT NULL REFERENCES interactions(id),
                movie_title TEXT,
                movie_url TEXT,
                movie_thumbnail TEXT,
                status TEXT NOT NULL,
                current_time_secs REAL NOT NULL DEFAULT 0,
                started_by TEXT NOT NULL REFERENCES accounts(id),
                started_at TEXT,
                ended_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_watch_sessions_match
                ON watch_sessions(match_id, created_at);

            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL REFERENCES accounts(id),
                provider_id TEXT NOT NULL REFERENCES accounts(id),
                booking_date TEXT NOT NULL,
                duration_hours REAL NOT NULL,
                hourly_rate REAL NOT NULL,
                total_amount REAL NOT NULL,
                location TEXT,
                notes TEXT,
                payment_intent_id TEXT,
                charge_id TEXT,
                payment_status TEXT NOT NULL DEFAULT 'pending',
                status TEXT NOT NULL DEFAULT 'pending',
                cancellation_reason TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                confirmed_at TEXT,
                completed_at TEXT,
                cancelled_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_bookings_client ON bookings(client_id);
            CREATE INDEX IF NOT EXISTS idx_bookings_provider ON bookings(provider_id);

            CREATE TABLE IF NOT EXISTS auth_sessions (
                token TEXT PRIMARY KEY,
                account_id TEXT NOT NULL REFERENCES accounts(id),
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(internal)
    }
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    let photos_json: String = row.get("photos")?;
    let goal_raw: String = row.get("goal")?;
    let plan_raw: String = row.get("subscription_plan")?;
    let status_raw: String = row.get("identity_verification_status")?;
    let verified_at: Option<String> = row.get("identity_verified_at")?;
    let last_attempt: Option<String> = row.get("last_verification_attempt")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_active: String = row.get("last_active")?;

    Ok(Account {
        id: AccountId(row.get("id")?),
        email: row.get("email")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        age: row.get("age")?,
        gender: row.get("gender")?,
        city: row.get("city")?,
        bio: row.get("bio")?,
        photos: serde_json::from_str(&photos_json).unwrap_or_default(),
        goal: Goal::from_str(&goal_raw).unwrap_or(Goal::Relationship),
        subscription_plan: SubscriptionPlan::from_str(&plan_raw).unwrap_or(SubscriptionPlan::Free),
        looking_for_gender: row.get("looking_for_gender")?,
        age_min: row.get("age_min")?,
        age_max: row.get("age_max")?,
        is_service_provider: row.get("is_service_provider")?,
        service_verified: row.get("service_verified")?,
        business_name: row.get("business_name")?,
        provider_stripe_key: row.get("provider_stripe_key")?,
        stripe_account_id: row.get("stripe_account_id")?,
        hourly_rate: row.get("hourly_rate")?,
        trust_score: row.get("trust_score")?,
        is_active: row.get("is_active")?,
        is_banned: row.get("is_banned")?,
        banned_reason: row.get("banned_reason")?,
        is_admin: row.get("is_admin")?,
        identity_verified: row.get("identity_verified")?,
        identity_verification_status: VerificationStatus::from_str(&status_raw)
            .unwrap_or(VerificationStatus::Unverified),
        identity_session_id: row.get("identity_session_id")?,
        identity_verified_at: parse_opt_ts(verified_at),
        identity_document_type: row.get("identity_document_type")?,
        identity_age_verified: row.get("identity_age_verified")?,
        verification_attempts: row.get("verification_attempts")?,
        last_verification_attempt: parse_opt_ts(last_attempt),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
        last_active: parse_ts(&last_active),
    })
}

const ACCOUNT_INSERT: &str = "
    INSERT INTO accounts (
        id, email, username, password_hash, first_name, last_name, age, gender,
        city, bio, photos, goal, subscription_plan, looking_for_gender, age_min,
        age_max, is_service_provider, service_verified, business_name,
        provider_stripe_key, stripe_account_id, hourly_rate, trust_score,
        is_active, is_banned, banned_reason, is_admin, identity_verified,
        identity_verification_status, identity_session_id, identity_verified_at,
        identity_document_type, identity_age_verified, verification_attempts,
        last_verification_attempt, created_at, updated_at, last_active
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
        ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
        ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38
    )";

const ACCOUNT_UPDATE: &str = "
    UPDATE accounts SET
        email = ?2, username = ?3, password_hash = ?4, first_name = ?5,
        last_name = ?6, age = ?7, gender = ?8, city = ?9, bio = ?10,
        photos = ?11, goal = ?12, subscription_plan = ?13,
        looking_for_gender = ?14, age_min = ?15, age_max = ?16,
        is_service_provider = ?17, service_verified = ?18, business_name = ?19,
        provider_stripe_key = ?20, stripe_account_id = ?21, hourly_rate = ?22,
        trust_score = ?23, is_active = ?24, is_banned = ?25,
        banned_reason = ?26, is_admin = ?27, identity_verified = ?28,
        identity_verification_status = ?29, identity_session_id = ?30,
        identity_verified_at = ?31, identity_document_type = ?32,
        identity_age_verified = ?33, verification_attempts = ?34,
        last_verification_attempt = ?35, created_at = ?36, updated_at = ?37,
        last_active = ?38
    WHERE id = ?1";

fn account_params(account: &Account) -> Vec<Box<dyn ToSql>> {
    vec![
        Box::new(account.id.0.clone()),
        Box::new(account.email.clone()),
        Box::new(account.username.clone()),
        Box::new(account.password_hash.clone()),
        Box::new(account.first_name.clone()),
        Box::new(account.last_name.clone()),
        Box::new(account.age),
        Box::new(account.gender.clone()),
        Box::new(account.city.clone()),
        Box::new(account.bio.clone()),
        Box::new(serde_json::to_string(&account.photos).unwrap_or_else(|_| "[]".to_string())),
        Box::new(account.goal.as_str()),
        Box::new(account.subscription_plan.as_str()),
        Box::new(account.looking_for_gender.clone()),
        Box::new(account.age_min),
        Box::new(account.age_max),
        Box::new(account.is_service_provider),
        Box::new(account.service_verified),
        Box::new(account.business_name.clone()),
        Box::new(account.provider_stripe_key.clone()),
        Box::new(account.stripe_account_id.clone()),
        Box::new(account.hourly_rate),
        Box::new(account.trust_score),
        Box::new(account.is_active),
        Box::new(account.is_banned),
        Box::new(account.banned_reason.clone()),
        Box::new(account.is_admin),
        Box::new(account.identity_verified),
        Box::new(account.identity_verification_status.as_str()),
        Box::new(account.identity_session_id.clone()),
        Box::new(account.identity_verified_at.map(|dt| dt.to_rfc3339())),
        Box::new(account.identity_document_type.clone()),
        Box::new(account.identity_age_verified),
        Box::new(account.verification_attempts),
        Box::new(account.last_verification_attempt.map(|dt| dt.to_rfc3339())),
        Box::new(account.created_at.to_rfc3339()),
        Box::new(account.updated_at.to_rfc3339()),
        Box::new(account.last_active.to_rfc3339()),
    ]
}

impl SqliteStore {
    fn query_account(&self, sql: &str, params: &[&dyn ToSql]) -> StoreResult<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(sql, params, row_to_account)
            .optional()
            .map_err(internal)
    }

    fn query_accounts(&self, sql: &str, params: &[&dyn ToSql]) -> StoreResult<Vec<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql).map_err(internal)?;
        let rows = stmt
            .query_map(params, row_to_account)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal);
        rows
    }
}

impl AccountStore for SqliteStore {
    fn create_account(&self, account: &Account) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let params = account_params(account);
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.execute(ACCOUNT_INSERT, refs.as_slice()).map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.code == rusqlite::ErrorCode::ConstraintViolation {
                    return ApiError::Conflict("Email or username already taken".to_string());
                }
            }
            internal(e)
        })?;
        Ok(())
    }

    fn get_account(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        self.query_account("SELECT * FROM accounts WHERE id = ?1", &[&id.0])
    }

    fn get_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.query_account(
            "SELECT * FROM accounts WHERE email = ?1 COLLATE NOCASE",
            &[&email],
        )
    }

    fn get_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        self.query_account("SELECT * FROM accounts WHERE username = ?1", &[&username])
    }

    fn update_account(&self, account: &Account) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let params = account_params(account);
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let changed = conn
            .execute(ACCOUNT_UPDATE, refs.as_slice())
            .map_err(internal)?;
        if changed == 0 {
            return Err(ApiError::NotFound("User"));
        }
        Ok(())
    }

    fn get_account_by_identity_session(&self, session_id: &str) -> StoreResult<Option<Account>> {
        self.query_account(
            "SELECT * FROM accounts WHERE identity_session_id = ?1",
            &[&session_id],
        )
    }

    fn list_accounts(
        &self,
        search: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Account>> {
        match search {
            Some(needle) => {
                let pattern = format!("%{needle}%");
                self.query_accounts(
                    "SELECT * FROM accounts
                     WHERE email LIKE ?1 OR username LIKE ?1 OR first_name LIKE ?1
                     ORDER BY created_at LIMIT ?2 OFFSET ?3",
                    &[&pattern, &(limit as i64), &(offset as i64)],
                )
            }
            None => self.query_accounts(
                "SELECT * FROM accounts ORDER BY created_at LIMIT ?1 OFFSET ?2",
                &[&(limit as i64), &(offset as i64)],
            ),
        }
    }

    fn discover(&self, actor: &Account, category: Goal, limit: usize) -> StoreResult<Vec<Account>> {
        let mut sql = String::from(
            "SELECT * FROM accounts
             WHERE id != ?1
               AND is_active = 1 AND is_banned = 0
               AND goal = ?2
               AND id NOT IN (SELECT receiver_id FROM interactions WHERE sender_id = ?1)
               AND id NOT IN (SELECT sender_id FROM interactions
                              WHERE receiver_id = ?1 AND status = 'matched')",
        );
        let mut params: Vec<Box<dyn ToSql>> =
            vec![Box::new(actor.id.0.clone()), Box::new(category.as_str())];

        if let Some(wanted) = actor.looking_for_gender.as_deref() {
            if wanted != "both" {
                params.push(Box::new(wanted.to_string()));
                sql.push_str(&format!(" AND gender = ?{}", params.len()));
            }
        }
        if let Some(min) = actor.age_min {
            params.push(Box::new(min));
            sql.push_str(&format!(" AND age >= ?{}", params.len()));
        }
        if let Some(max) = actor.age_max {
            params.push(Box::new(max));
            sql.push_str(&format!(" AND age <= ?{}", params.len()));
        }

        params.push(Box::new(limit as i64));
        sql.push_str(&format!(" ORDER BY created_at LIMIT ?{}", params.len()));

        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        self.query_accounts(&sql, refs.as_slice())
    }
}

fn row_to_interaction(row: &Row<'_>) -> rusqlite::Result<Interaction> {
    let status_raw: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    Ok(Interaction {
        id: MatchId(row.get("id")?),
        sender_id: AccountId(row.get("sender_id")?),
        receiver_id: AccountId(row.get("receiver_id")?),
        status: InteractionStatus::from_str(&status_raw).unwrap_or(InteractionStatus::Liked),
        created_at: parse_ts(&created_at),
    })
}

impl SqliteStore {
    fn query_interactions(&self, sql: &str, params: &[&dyn ToSql]) -> StoreResult<Vec<Interaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql).map_err(internal)?;
        let rows = stmt
            .query_map(params, row_to_interaction)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal);
        rows
    }
}

impl MatchStore for SqliteStore {
    fn record_swipe(
        &self,
        actor: &AccountId,
        target: &AccountId,
        kind: SwipeKind,
    ) -> StoreResult<SwipeOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(internal)?;

        let duplicate: bool = tx
            .query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM interactions
                     WHERE (sender_id = ?1 AND receiver_id = ?2)
                        OR (sender_id = ?2 AND receiver_id = ?1 AND status = 'matched')
                 )",
                params![actor.0, target.0],
                |row| row.get(0),
            )
            .map_err(internal)?;
        if duplicate {
            return Err(ApiError::Conflict(
                "Already interacted with this user".to_string(),
            ));
        }

        // A reciprocal pending like gets promoted in place; the promoted row
        // is the single record of the match.
        if kind == SwipeKind::Like {
            let reciprocal: Option<String> = tx
                .query_row(
                    "SELECT id FROM interactions
                     WHERE sender_id = ?1 AND receiver_id = ?2 AND status = 'liked'",
                    params![target.0, actor.0],
                    |row| row.get(0),
                )
                .optional()
                .map_err(internal)?;

            if let Some(reciprocal_id) = reciprocal {
                tx.execute(
                    "UPDATE interactions SET status = 'matched' WHERE id = ?1",
                    params![reciprocal_id],
                )
                .map_err(internal)?;
                tx.commit().map_err(internal)?;
                return Ok(SwipeOutcome {
                    match_id: MatchId(reciprocal_id),
                    is_match: true,
                });
            }
        }

        let match_id = MatchId::generate();
        let status = match kind {
            SwipeKind::Like => InteractionStatus::Liked,
            SwipeKind::Pass => InteractionStatus::Passed,
        };
        tx.execute(
            "INSERT INTO interactions (id, sender_id, receiver_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                match_id.0,
                actor.0,
                target.0,
                status.as_str(),
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(internal)?;

        tx.commit().map_err(internal)?;
        Ok(SwipeOutcome {
            match_id,
            is_match: false,
        })
    }

    fn get_interaction(&self, id: &MatchId) -> StoreResult<Option<Interaction>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM interactions WHERE id = ?1",
            params![id.0],
            row_to_interaction,
        )
        .optional()
        .map_err(internal)
    }

    fn list_matches(&self, account: &AccountId) -> StoreResult<Vec<Interaction>> {
        self.query_interactions(
            "SELECT * FROM interactions
             WHERE status = 'matched' AND (sender_id = ?1 OR receiver_id = ?1)
             ORDER BY created_at",
            &[&account.0],
        )
    }

    fn list_incoming_likes(&self, account: &AccountId) -> StoreResult<Vec<Interaction>> {
        self.query_interactions(
            "SELECT * FROM interactions
             WHERE status = 'liked' AND receiver_id = ?1
             ORDER BY created_at",
            &[&account.0],
        )
    }

    fn find_match_between(&self, a: &AccountId, b: &AccountId) -> StoreResult<Option<Interaction>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM interactions
             WHERE status = 'matched'
               AND ((sender_id = ?1 AND receiver_id = ?2)
                 OR (sender_id = ?2 AND receiver_id = ?1))",
            params![a.0, b.0],
            row_to_interaction,
        )
        .optional()
        .map_err(internal)
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let created_at: String = row.get("created_at")?;
    Ok(Message {
        id: row.get("id")?,
        match_id: MatchId(row.get("match_id")?),
        sender_id: AccountId(row.get("sender_id")?),
        body: row.get("body")?,
        is_read: row.get("is_read")?,
        created_at: parse_ts(&created_at),
    })
}

impl ChatStore for SqliteStore {
    fn create_message(&self, message: &Message) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (id, match_id, sender_id, body, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id,
                message.match_id.0,
                message.sender_id.0,
                message.body,
                message.is_read,
                message.created_at.to_rfc3339()
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn list_messages(&self, match_id: &MatchId) -> StoreResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM messages WHERE match_id = ?1 ORDER BY created_at")
            .map_err(internal)?;
        let rows = stmt
            .query_map(params![match_id.0], row_to_message)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal);
        rows
    }

    fn mark_messages_read(&self, match_id: &MatchId, reader: &AccountId) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE messages SET is_read = 1
                 WHERE match_id = ?1 AND sender_id != ?2 AND is_read = 0",
                params![match_id.0, reader.0],
            )
            .map_err(internal)?;
        Ok(changed as u64)
    }
}

fn row_to_watch_session(row: &Row<'_>) -> rusqlite::Result<WatchSession> {
    let status_raw: String = row.get("status")?;
    let started_at: Option<String> = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(WatchSession {
        id: row.get("id")?,
        match_id: MatchId(row.get("match_id")?),
        movie_title: row.get("movie_title")?,
        movie_url: row.get("movie_url")?,
        movie_thumbnail: row.get("movie_thumbnail")?,
        status: WatchStatus::from_str(&status_raw).unwrap_or(WatchStatus::Selecting),
        current_time: row.get("current_time_secs")?,
        started_by: AccountId(row.get("started_by")?),
        started_at: parse_opt_ts(started_at),
        ended_at: parse_opt_ts(ended_at),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

impl WatchStore for SqliteStore {
    fn create_watch_session(&self, session: &WatchSession) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO watch_sessions (
                id, match_id, movie_title, movie_url, movie_thumbnail, status,
                current_time_secs, started_by, started_at, ended_at, created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                session.id,
                session.match_id.0,
                session.movie_title,
                session.movie_url,
                session.movie_thumbnail,
                session.status.as_str(),
                session.current_time,
                session.started_by.0,
                session.started_at.map(|dt| dt.to_rfc3339()),
                session.ended_at.map(|dt| dt.to_rfc3339()),
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339()
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn latest_watch_session(&self, match_id: &MatchId) -> StoreResult<Option<WatchSession>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM watch_sessions WHERE match_id = ?1
             ORDER BY created_at DESC LIMIT 1",
            params![match_id.0],
            row_to_watch_session,
        )
        .optional()
        .map_err(internal)
    }

    fn get_watch_session(&self, id: &str, match_id: &MatchId) -> StoreResult<Option<WatchSession>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM watch_sessions WHERE id = ?1 AND match_id = ?2",
            params![id, match_id.0],
            row_to_watch_session,
        )
        .optional()
        .map_err(internal)
    }

    fn update_watch_session(&self, session: &WatchSession) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE watch_sessions SET
                    movie_title = ?2, movie_url = ?3, movie_thumbnail = ?4,
                    status = ?5, current_time_secs = ?6, started_at = ?7,
                    ended_at = ?8, updated_at = ?9
                 WHERE id = ?1",
                params![
                    session.id,
                    session.movie_title,
                    session.movie_url,
                    session.movie_thumbnail,
                    session.status.as_str(),
                    session.current_time,
                    session.started_at.map(|dt| dt.to_rfc3339()),
                    session.ended_at.map(|dt| dt.to_rfc3339()),
                    session.updated_at.to_rfc3339()
                ],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(ApiError::NotFound("Session"));
        }
        Ok(())
    }
}

fn row_to_booking(row: &Row<'_>) -> rusqlite::Result<Booking> {
    let payment_raw: String = row.get("payment_status")?;
    let status_raw: String = row.get("status")?;
    let booking_date: String = row.get("booking_date")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let confirmed_at: Option<String> = row.get("confirmed_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let cancelled_at: Option<String> = row.get("cancelled_at")?;
    Ok(Booking {
        id: row.get("id")?,
        client_id: AccountId(row.get("client_id")?),
        provider_id: AccountId(row.get("provider_id")?),
        booking_date: parse_ts(&booking_date),
        duration_hours: row.get("duration_hours")?,
        hourly_rate: row.get("hourly_rate")?,
        total_amount: row.get("total_amount")?,
        location: row.get("location")?,
        notes: row.get("notes")?,
        payment_intent_id: row.get("payment_intent_id")?,
        charge_id: row.get("charge_id")?,
        payment_status: PaymentStatus::from_str(&payment_raw).unwrap_or(PaymentStatus::Pending),
        status: BookingStatus::from_str(&status_raw).unwrap_or(BookingStatus::Pending),
        cancellation_reason: row.get("cancellation_reason")?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
        confirmed_at: parse_opt_ts(confirmed_at),
        completed_at: parse_opt_ts(completed_at),
        cancelled_at: parse_opt_ts(cancelled_at),
    })
}

impl BookingStore for SqliteStore {
    fn create_booking(&self, booking: &Booking) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO bookings (
                id, client_id, provider_id, booking_date, duration_hours,
                hourly_rate, total_amount, location, notes, payment_intent_id,
                charge_id, payment_status, status, cancellation_reason,
                created_at, updated_at, confirmed_at, completed_at, cancelled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                booking.id,
                booking.client_id.0,
                booking.provider_id.0,
                booking.booking_date.to_rfc3339(),
                booking.duration_hours,
                booking.hourly_rate,
                booking.total_amount,
                booking.location,
                booking.notes,
                booking.payment_intent_id,
                booking.charge_id,
                booking.payment_status.as_str(),
                booking.status.as_str(),
                booking.cancellation_reason,
                booking.created_at.to_rfc3339(),
                booking.updated_at.to_rfc3339(),
                booking.confirmed_at.map(|dt| dt.to_rfc3339()),
                booking.completed_at.map(|dt| dt.to_rfc3339()),
                booking.cancelled_at.map(|dt| dt.to_rfc3339())
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn get_booking(&self, id: &str) -> StoreResult<Option<Booking>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM bookings WHERE id = ?1",
            params![id],
            row_to_booking,
        )
        .optional()
        .map_err(internal)
    }

    fn update_booking(&self, booking: &Booking) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE bookings SET
                    payment_intent_id = ?2, charge_id = ?3, payment_status = ?4,
                    status = ?5, cancellation_reason = ?6, updated_at = ?7,
                    confirmed_at = ?8, completed_at = ?9, cancelled_at = ?10
                 WHERE id = ?1",
                params![
                    booking.id,
                    booking.payment_intent_id,
                    booking.charge_id,
                    booking.payment_status.as_str(),
                    booking.status.as_str(),
                    booking.cancellation_reason,
                    booking.updated_at.to_rfc3339(),
                    booking.confirmed_at.map(|dt| dt.to_rfc3339()),
                    booking.completed_at.map(|dt| dt.to_rfc3339()),
                    booking.cancelled_at.map(|dt| dt.to_rfc3339())
                ],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(ApiError::NotFound("Booking"));
        }
        Ok(())
    }

    fn list_bookings(&self, account: &AccountId, role: BookingRole) -> StoreResult<Vec<Booking>> {
        let sql = match role {
            BookingRole::Client => {
                "SELECT * FROM bookings WHERE client_id = ?1 ORDER BY created_at DESC"
            }
            BookingRole::Provider => {
                "SELECT * FROM bookings WHERE provider_id = ?1 ORDER BY created_at DESC"
            }
        };
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql).map_err(internal)?;
        let rows = stmt
            .query_map(params![account.0], row_to_booking)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal);
        rows
    }
}

impl StatsStore for SqliteStore {
    fn platform_stats(&self) -> StoreResult<PlatformStats> {
        let conn = self.conn.lock().unwrap();
        let count = |sql: &str| -> StoreResult<u64> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(internal)
        };

        let mut stats = PlatformStats {
            total_users: count("SELECT COUNT(*) FROM accounts")?,
            active_users: count("SELECT COUNT(*) FROM accounts WHERE is_active = 1")?,
            banned_users: count("SELECT COUNT(*) FROM accounts WHERE is_banned = 1")?,
            total_matches: count("SELECT COUNT(*) FROM interactions WHERE status = 'matched'")?,
            total_likes: count("SELECT COUNT(*) FROM interactions WHERE status = 'liked'")?,
            total_messages: count("SELECT COUNT(*) FROM messages")?,
            ..Default::default()
        };

        let mut stmt = conn
            .prepare("SELECT goal, COUNT(*) FROM accounts GROUP BY goal")
            .map_err(internal)?;
        let goals = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        for (goal, n) in goals {
            stats.users_by_goal.insert(goal, n as u64);
        }

        let mut stmt = conn
            .prepare("SELECT subscription_plan, COUNT(*) FROM accounts GROUP BY subscription_plan")
            .map_err(internal)?;
        let plans = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        for (plan, n) in plans {
            stats.users_by_subscription.insert(plan, n as u64);
        }

        Ok(stats)
    }
}

impl TokenStore for SqliteStore {
    fn create_auth_session(&self, account: &AccountId) -> StoreResult<AuthSession> {
        let session = AuthSession {
            token: generate_session_token(),
            account_id: account.clone(),
            created_at: Utc::now(),
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_sessions (token, account_id, created_at) VALUES (?1, ?2, ?3)",
            params![
                session.token,
                session.account_id.0,
                session.created_at.to_rfc3339()
            ],
        )
        .map_err(internal)?;
        Ok(session)
    }

    fn get_auth_session(&self, token: &str) -> StoreResult<Option<AuthSession>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT token, account_id, created_at FROM auth_sessions WHERE token = ?1",
            params![token],
            |row| {
                let created_at: String = row.get(2)?;
                Ok(AuthSession {
                    token: row.get(0)?,
                    account_id: AccountId(row.get(1)?),
                    created_at: parse_ts(&created_at),
                })
            },
        )
        .optional()
        .map_err(internal)
    }

    fn delete_auth_session(&self, token: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM auth_sessions WHERE token = ?1", params![token])
            .map_err(internal)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SwipeKind;

    fn account(username: &str) -> Account {
        Account {
            id: AccountId::generate(),
            email: format!("{username}@example.com"),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
            age: Some(28),
            gender: Some("female".to_string()),
            city: None,
            bio: None,
            photos: vec!["photo-1".to_string(), "photo-2".to_string()],
            goal: Goal::Relationship,
            subscription_plan: SubscriptionPlan::Free,
            looking_for_gender: None,
            age_min: None,
            age_max: None,
            is_service_provider: false,
            service_verified: false,
            business_name: None,
            provider_stripe_key: None,
            stripe_account_id: None,
            hourly_rate: None,
            trust_score: 50,
            is_active: true,
            is_banned: false,
            banned_reason: None,
            is_admin: false,
            identity_verified: false,
            identity_verification_status: VerificationStatus::Unverified,
            identity_session_id: None,
            identity_verified_at: None,
            identity_document_type: None,
            identity_age_verified: false,
            verification_attempts: 0,
            last_verification_attempt: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_active: Utc::now(),
        }
    }

    #[test]
    fn test_account_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let account = account("roundtrip");
        store.create_account(&account).unwrap();

        let loaded = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(loaded.email, account.email);
        assert_eq!(loaded.photos, account.photos);
        assert_eq!(loaded.goal, Goal::Relationship);
        assert_eq!(loaded.trust_score, 50);
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = account("first");
        let mut second = account("second");
        second.email = first.email.clone();

        store.create_account(&first).unwrap();
        let err = store.create_account(&second).unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn test_swipe_promotion_is_transactional() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = account("sq_alice");
        let b = account("sq_bob");
        store.create_account(&a).unwrap();
        store.create_account(&b).unwrap();

        let first = store.record_swipe(&a.id, &b.id, SwipeKind::Like).unwrap();
        let outcome = store.record_swipe(&b.id, &a.id, SwipeKind::Like).unwrap();
        assert!(outcome.is_match);
        assert_eq!(outcome.match_id, first.match_id);

        // One match record per pair, visible from both sides
        let matches_a = store.list_matches(&a.id).unwrap();
        let matches_b = store.list_matches(&b.id).unwrap();
        assert_eq!(matches_a.len(), 1);
        assert_eq!(matches_b.len(), 1);
    }

    #[test]
    fn test_platform_stats_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = account("st_alice");
        let b = account("st_bob");
        let mut c = account("st_carol");
        c.is_banned = true;
        c.subscription_plan = SubscriptionPlan::Premium;
        store.create_account(&a).unwrap();
        store.create_account(&b).unwrap();
        store.create_account(&c).unwrap();

        store.record_swipe(&a.id, &b.id, SwipeKind::Like).unwrap();
        let outcome = store.record_swipe(&b.id, &a.id, SwipeKind::Like).unwrap();
        store.record_swipe(&a.id, &c.id, SwipeKind::Like).unwrap();

        store
            .create_message(&Message {
                id: uuid::Uuid::new_v4().to_string(),
                match_id: outcome.match_id,
                sender_id: a.id.clone(),
                body: "hi".to_string(),
                is_read: false,
                created_at: Utc::now(),
            })
            .unwrap();

        let stats = store.platform_stats().unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.banned_users, 1);
        assert_eq!(stats.users_by_goal["relationship"], 3);
        assert_eq!(stats.users_by_subscription["free"], 2);
        assert_eq!(stats.users_by_subscription["premium"], 1);
        assert_eq!(stats.total_matches, 1);
        assert_eq!(stats.total_likes, 1);
        assert_eq!(stats.total_messages, 1);
    }

    #[test]
    fn test_booking_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let client = account("client");
        let provider = account("provider");
        store.create_account(&client).unwrap();
        store.create_account(&provider).unwrap();

        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: client.id.clone(),
            provider_id: provider.id.clone(),
            booking_date: Utc::now(),
            duration_hours: 2.0,
            hourly_rate: 5000.0,
            total_amount: 10000.0,
            location: Some("downtown".to_string()),
            notes: None,
            payment_intent_id: None,
            charge_id: None,
            payment_status: PaymentStatus::Pending,
            status: BookingStatus::Pending,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
        };
        store.create_booking(&booking).unwrap();

        let mut loaded = store.get_booking(&booking.id).unwrap().unwrap();
        assert_eq!(loaded.total_amount, 10000.0);
        assert_eq!(loaded.payment_status, PaymentStatus::Pending);

        loaded.payment_status = PaymentStatus::Paid;
        loaded.confirmed_at = Some(Utc::now());
        store.update_booking(&loaded).unwrap();

        let reloaded = store.get_booking(&booking.id).unwrap().unwrap();
        assert_eq!(reloaded.payment_status, PaymentStatus::Paid);
        assert!(reloaded.confirmed_at.is_some());
    }
}
