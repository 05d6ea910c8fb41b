//! Domain models for platform storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique account identifier (UUID string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique interaction (match record) identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchId(pub String);

impl MatchId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared goal category for an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Relationship,
    Friendship,
    IntimateServices,
    Casual,
}

impl Goal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Goal::Relationship => "relationship",
            Goal::Friendship => "friendship",
            Goal::IntimateServices => "intimate_services",
            Goal::Casual => "casual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "relationship" => Some(Goal::Relationship),
            "friendship" => Some(Goal::Friendship),
            "intimate_services" => Some(Goal::IntimateServices),
            "casual" => Some(Goal::Casual),
            _ => None,
        }
    }
}

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Free,
    Standard,
    Premium,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Standard => "standard",
            SubscriptionPlan::Premium => "premium",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "free" => Some(SubscriptionPlan::Free),
            "standard" => Some(SubscriptionPlan::Standard),
            "premium" => Some(SubscriptionPlan::Premium),
            _ => None,
        }
    }
}

/// Identity verification status tracked on an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Unverified,
    Pending,
    Processing,
    Verified,
    Failed,
    Cancelled,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Processing => "processing",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Failed => "failed",
            VerificationStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unverified" => Some(VerificationStatus::Unverified),
            "pending" => Some(VerificationStatus::Pending),
            "processing" => Some(VerificationStatus::Processing),
            "verified" => Some(VerificationStatus::Verified),
            "failed" => Some(VerificationStatus::Failed),
            "cancelled" => Some(VerificationStatus::Cancelled),
            _ => None,
        }
    }
}

/// A user account
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub bio: Option<String>,
    /// Photo URLs; only the first is exposed in previews
    pub photos: Vec<String>,
    pub goal: Goal,
    pub subscription_plan: SubscriptionPlan,

    // Preferences
    pub looking_for_gender: Option<String>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,

    // Service provider block
    pub is_service_provider: bool,
    pub service_verified: bool,
    pub business_name: Option<String>,
    /// Provider's own Stripe secret key (direct-charge model)
    pub provider_stripe_key: Option<String>,
    pub stripe_account_id: Option<String>,
    pub hourly_rate: Option<f64>,

    // Trust and moderation
    pub trust_score: i32,
    pub is_active: bool,
    pub is_banned: bool,
    pub banned_reason: Option<String>,
    pub is_admin: bool,

    // Identity verification block
    pub identity_verified: bool,
    pub identity_verification_status: VerificationStatus,
    pub identity_session_id: Option<String>,
    pub identity_verified_at: Option<DateTime<Utc>>,
    pub identity_document_type: Option<String>,
    pub identity_age_verified: bool,
    pub verification_attempts: i32,
    pub last_verification_attempt: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Account {
    /// Whether this account may use gated platform features
    pub fn can_use_platform(&self) -> bool {
        self.identity_verified && self.identity_age_verified
    }

    /// First photo only, to bound preview payload size
    pub fn preview_photos(&self) -> Vec<String> {
        self.photos.iter().take(1).cloned().collect()
    }
}

/// Public profile projection returned from discovery and match listings
#[derive(Debug, Clone, Serialize)]
pub struct ProfilePreview {
    pub id: AccountId,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub bio: Option<String>,
    pub photos: Vec<String>,
    pub goal: Goal,
    pub trust_score: i32,
    pub is_service_provider: bool,
    pub service_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<f64>,
}

impl From<&Account> for ProfilePreview {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            age: account.age,
            gender: account.gender.clone(),
            city: account.city.clone(),
            bio: account.bio.clone(),
            photos: account.preview_photos(),
            goal: account.goal,
            trust_score: account.trust_score,
            is_service_provider: account.is_service_provider,
            service_verified: account.service_verified,
            hourly_rate: if account.is_service_provider {
                account.hourly_rate
            } else {
                None
            },
        }
    }
}

/// Directed swipe action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeKind {
    Like,
    Pass,
}

/// Status of a directed interaction edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    Liked,
    Passed,
    Matched,
}

impl InteractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionStatus::Liked => "liked",
            InteractionStatus::Passed => "passed",
            InteractionStatus::Matched => "matched",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "liked" => Some(InteractionStatus::Liked),
            "passed" => Some(InteractionStatus::Passed),
            "matched" => Some(InteractionStatus::Matched),
            _ => None,
        }
    }
}

/// A directed like/pass/matched record between two accounts
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: MatchId,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub status: InteractionStatus,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    /// Whether the given account is one of the two sides
    pub fn involves(&self, account: &AccountId) -> bool {
        &self.sender_id == account || &self.receiver_id == account
    }

    /// The other side of the edge relative to `account`
    pub fn counterpart(&self, account: &AccountId) -> &AccountId {
        if &self.sender_id == account {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

/// Result of recording a swipe
#[derive(Debug, Clone)]
pub struct SwipeOutcome {
    pub match_id: MatchId,
    pub is_match: bool,
}

/// A chat message scoped to a matched pair
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub match_id: MatchId,
    pub sender_id: AccountId,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Watch-together playback status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    Selecting,
    Playing,
    Paused,
    Ended,
}

impl WatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchStatus::Selecting => "selecting",
            WatchStatus::Playing => "playing",
            WatchStatus::Paused => "paused",
            WatchStatus::Ended => "ended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "selecting" => Some(WatchStatus::Selecting),
            "playing" => Some(WatchStatus::Playing),
            "paused" => Some(WatchStatus::Paused),
            "ended" => Some(WatchStatus::Ended),
            _ => None,
        }
    }

    /// Allowed status transitions. Re-asserting the current status is
    /// permitted; `Ended` is terminal.
    pub fn can_transition(self, next: WatchStatus) -> bool {
        use WatchStatus::*;
        if self == next {
            return self != Ended;
        }
        match (self, next) {
            (Selecting, Playing) | (Selecting, Ended) => true,
            (Playing, Paused) | (Playing, Ended) => true,
            (Paused, Playing) | (Paused, Ended) => true,
            _ => false,
        }
    }
}

/// Synchronized playback state for a matched pair
#[derive(Debug, Clone)]
pub struct WatchSession {
    pub id: String,
    pub match_id: MatchId,
    pub movie_title: Option<String>,
    pub movie_url: Option<String>,
    pub movie_thumbnail: Option<String>,
    pub status: WatchStatus,
    /// Current playback position in seconds; last writer wins
    pub current_time: f64,
    pub started_by: AccountId,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment status of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "refunded" => Some(PaymentStatus::Refunded),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// Lifecycle status of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

/// Role an account plays on a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingRole {
    Client,
    Provider,
}

/// A scheduled paid engagement between a client and a service provider
#[derive(Debug, Clone)]
pub struct Booking {
    pub id: String,
    pub client_id: AccountId,
    pub provider_id: AccountId,
    pub booking_date: DateTime<Utc>,
    pub duration_hours: f64,
    /// Provider's hourly rate at creation time, frozen
    pub hourly_rate: f64,
    /// duration_hours * hourly_rate, computed once and frozen
    pub total_amount: f64,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub payment_intent_id: Option<String>,
    pub charge_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Platform-wide counters for the admin dashboard
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlatformStats {
    pub total_users: u64,
    pub active_users: u64,
    pub banned_users: u64,
    pub users_by_goal: std::collections::BTreeMap<String, u64>,
    pub users_by_subscription: std::collections::BTreeMap<String, u64>,
    pub total_matches: u64,
    pub total_likes: u64,
    pub total_messages: u64,
}

/// An authenticated cookie session
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_transitions() {
        use WatchStatus::*;

        assert!(Selecting.can_transition(Playing));
        assert!(Selecting.can_transition(Ended));
        assert!(Playing.can_transition(Paused));
        assert!(Paused.can_transition(Playing));
        assert!(Paused.can_transition(Ended));

        // Re-asserting the current status is idempotent
        assert!(Playing.can_transition(Playing));
        assert!(Selecting.can_transition(Selecting));

        // Skipping straight from selecting to paused makes no sense
        assert!(!Selecting.can_transition(Paused));
        assert!(!Playing.can_transition(Selecting));
        assert!(!Paused.can_transition(Selecting));

        // Ended is terminal
        assert!(!Ended.can_transition(Playing));
        assert!(!Ended.can_transition(Selecting));
        assert!(!Ended.can_transition(Ended));
    }

    #[test]
    fn test_interaction_counterpart() {
        let a = AccountId("a".to_string());
        let b = AccountId("b".to_string());
        let interaction = Interaction {
            id: MatchId::generate(),
            sender_id: a.clone(),
            receiver_id: b.clone(),
            status: InteractionStatus::Matched,
            created_at: Utc::now(),
        };

        assert!(interaction.involves(&a));
        assert!(interaction.involves(&b));
        assert_eq!(interaction.counterpart(&a), &b);
        assert_eq!(interaction.counterpart(&b), &a);
        assert!(!interaction.involves(&AccountId("c".to_string())));
    }

    #[test]
    fn test_preview_projection() {
        let account = test_account();
        let preview = ProfilePreview::from(&account);

        // Rate is only exposed for service providers
        assert!(preview.hourly_rate.is_none());
        // Only the first photo is included
        assert_eq!(preview.photos, vec!["p1".to_string()]);
    }

    fn test_account() -> Account {
        Account {
            id: AccountId::generate(),
            email: "a@example.com".to_string(),
            username: "a".to_string(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            age: Some(25),
            gender: None,
            city: None,
            bio: None,
            photos: vec!["p1".to_string(), "p2".to_string()],
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
            hourly_rate: Some(100.0),
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
}
