//! Shared test utilities for `SuggestionBuddy`.
//!
//! Provides an in-memory database, an in-memory chat platform, and a harness
//! that wires the whole lifecycle together the same way the bot does.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        platform::{ChatPlatform, ReactionCount},
        publisher::{AnnounceSettings, ResolutionPublisher},
        registry::SuggestionRegistry,
        retry::RetryPolicy,
        service::{LifecycleSettings, SuggestionService},
        staff_poll::{PollSettings, StaffPollManager},
        suggestion::{
            ChannelId, CommunityTally, Marker, MessageRef, RoleId, Stage, Suggestion,
            SuggestionId, UserId,
        },
        watcher::ThresholdWatcher,
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::DatabaseConnection;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

/// Public suggestion channel used in tests
pub const SUGGESTION_CHANNEL: ChannelId = ChannelId(100);
/// Staff poll channel used in tests
pub const STAFF_CHANNEL: ChannelId = ChannelId(200);
/// Announcement channel used in tests
pub const ANNOUNCE_CHANNEL: ChannelId = ChannelId(300);
/// Role whose members form the staff snapshot
pub const STAFF_ROLE: RoleId = RoleId(400);
/// Role mentioned in announcements
pub const ANNOUNCE_ROLE: RoleId = RoleId(401);
/// The fake platform's own bot account
pub const BOT_USER: UserId = UserId(999);

pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Fixed "now" so deadlines are predictable.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

/// An open suggestion that was never posted anywhere.
pub fn sample_suggestion() -> Suggestion {
    Suggestion {
        id: SuggestionId(500),
        message: MessageRef::new(SUGGESTION_CHANNEL.0, 500),
        author_id: UserId(7),
        title: "Add a music channel".to_string(),
        body: "Somewhere to share playlists.".to_string(),
        stage: Stage::Open,
        created_at: test_now(),
        staff_poll: None,
        outcome: None,
        announcement: None,
        halted: false,
        community: CommunityTally::default(),
    }
}

/// Lifecycle settings pointing at the test channels: threshold 2, 24 hour
/// polls, and immediate retries.
pub fn test_settings() -> LifecycleSettings {
    LifecycleSettings {
        suggestion_channel: SUGGESTION_CHANNEL,
        upvote_threshold: 2,
        poll: PollSettings {
            staff_channel: STAFF_CHANNEL,
            staff_role: STAFF_ROLE,
            duration: Duration::hours(24),
        },
        announce: AnnounceSettings {
            channel: ANNOUNCE_CHANNEL,
            role: Some(ANNOUNCE_ROLE),
        },
        retry: RetryPolicy::immediate(3),
    }
}

/// A message as the fake platform stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeMessage {
    /// Channel posted in
    pub channel: ChannelId,
    /// Text content
    pub content: String,
    /// Markers the bot pre-applied
    pub markers: Vec<Marker>,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    messages: BTreeMap<u64, FakeMessage>,
    reactions: HashMap<u64, HashMap<Marker, HashSet<UserId>>>,
    roles: HashMap<RoleId, HashSet<UserId>>,
    failing_posts: u32,
    notices: Vec<(UserId, String)>,
}

/// In-memory [`ChatPlatform`] with knobs for reactions, deletions, role
/// membership, and post failures.
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePlatform {
    /// Empty platform; message ids start at 1000.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_id: 1000,
                ..FakeState::default()
            }),
        }
    }

    /// Adds `user`'s reaction to `message`.
    pub fn react(&self, message: MessageRef, marker: Marker, user: u64) {
        let mut state = self.state.lock().unwrap();
        state
            .reactions
            .entry(message.message_id)
            .or_default()
            .entry(marker)
            .or_default()
            .insert(UserId(user));
    }

    /// Deletes a message; later reads report it as gone.
    pub fn delete(&self, message: MessageRef) {
        let mut state = self.state.lock().unwrap();
        state.messages.remove(&message.message_id);
        state.reactions.remove(&message.message_id);
    }

    /// Replaces the members of `role`.
    pub fn set_role_members(&self, role: RoleId, members: &[u64]) {
        let mut state = self.state.lock().unwrap();
        state
            .roles
            .insert(role, members.iter().copied().map(UserId).collect());
    }

    /// Makes the next `count` posts fail with a transport error. Zero clears.
    pub fn fail_next_posts(&self, count: u32) {
        self.state.lock().unwrap().failing_posts = count;
    }

    /// Messages currently in `channel`, oldest first.
    pub fn posts_in(&self, channel: ChannelId) -> Vec<FakeMessage> {
        let state = self.state.lock().unwrap();
        state
            .messages
            .values()
            .filter(|m| m.channel == channel)
            .cloned()
            .collect()
    }

    /// A single message, unless deleted.
    pub fn message(&self, message: MessageRef) -> Option<FakeMessage> {
        self.state
            .lock()
            .unwrap()
            .messages
            .get(&message.message_id)
            .cloned()
    }

    /// Private notices sent to `user`.
    pub fn notices_for(&self, user: UserId) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .notices
            .iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn post_message(
        &self,
        channel: ChannelId,
        content: &str,
        markers: &[Marker],
    ) -> Result<MessageRef> {
        let mut state = self.state.lock().unwrap();
        if state.failing_posts > 0 {
            state.failing_posts -= 1;
            return Err(Error::Transport {
                message: "fake platform unavailable".to_string(),
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        state.messages.insert(
            id,
            FakeMessage {
                channel,
                content: content.to_string(),
                markers: markers.to_vec(),
            },
        );
        let reactions = state.reactions.entry(id).or_default();
        for marker in markers {
            reactions.entry(*marker).or_default().insert(BOT_USER);
        }
        Ok(MessageRef::new(channel.0, id))
    }

    async fn fetch_reaction_counts(&self, message: MessageRef) -> Result<Vec<ReactionCount>> {
        let state = self.state.lock().unwrap();
        if !state.messages.contains_key(&message.message_id) {
            return Err(Error::MessageGone {
                message_id: message.message_id,
            });
        }
        Ok(state
            .reactions
            .get(&message.message_id)
            .map(|by_marker| {
                by_marker
                    .iter()
                    .map(|(marker, users)| ReactionCount {
                        marker: *marker,
                        count: u32::try_from(users.len()).unwrap(),
                        includes_bot: users.contains(&BOT_USER),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_reaction_users(
        &self,
        message: MessageRef,
        marker: Marker,
    ) -> Result<HashSet<UserId>> {
        let state = self.state.lock().unwrap();
        if !state.messages.contains_key(&message.message_id) {
            return Err(Error::MessageGone {
                message_id: message.message_id,
            });
        }
        Ok(state
            .reactions
            .get(&message.message_id)
            .and_then(|by_marker| by_marker.get(&marker))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_role_members(&self, role: RoleId) -> Result<HashSet<UserId>> {
        let state = self.state.lock().unwrap();
        Ok(state.roles.get(&role).cloned().unwrap_or_default())
    }

    async fn notify_user(&self, user: UserId, content: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .notices
            .push((user, content.to_string()));
        Ok(())
    }

    fn bot_user_id(&self) -> Option<UserId> {
        Some(BOT_USER)
    }
}

/// Wraps a [`FakePlatform`] and holds the first staff-channel post after it
/// is visible, until released. Lets a test act while a poll exists on the
/// platform but is not yet registered.
pub struct HeldStaffPost {
    inner: Arc<FakePlatform>,
    armed: AtomicBool,
    posted: Notify,
    release: Notify,
}

impl HeldStaffPost {
    /// Waits until the held post has reached the platform.
    pub async fn wait_posted(&self) {
        self.posted.notified().await;
    }

    /// Lets the held post return.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl ChatPlatform for HeldStaffPost {
    async fn post_message(
        &self,
        channel: ChannelId,
        content: &str,
        markers: &[Marker],
    ) -> Result<MessageRef> {
        let posted = self.inner.post_message(channel, content, markers).await;
        if channel == STAFF_CHANNEL && self.armed.swap(false, Ordering::SeqCst) {
            self.posted.notify_one();
            self.release.notified().await;
        }
        posted
    }

    async fn fetch_reaction_counts(&self, message: MessageRef) -> Result<Vec<ReactionCount>> {
        self.inner.fetch_reaction_counts(message).await
    }

    async fn fetch_reaction_users(
        &self,
        message: MessageRef,
        marker: Marker,
    ) -> Result<HashSet<UserId>> {
        self.inner.fetch_reaction_users(message, marker).await
    }

    async fn fetch_role_members(&self, role: RoleId) -> Result<HashSet<UserId>> {
        self.inner.fetch_role_members(role).await
    }

    async fn notify_user(&self, user: UserId, content: &str) -> Result<()> {
        self.inner.notify_user(user, content).await
    }

    fn bot_user_id(&self) -> Option<UserId> {
        self.inner.bot_user_id()
    }
}

/// The full lifecycle over a [`FakePlatform`] and an in-memory archive.
pub struct TestHarness {
    /// Fake platform the lifecycle talks to
    pub platform: Arc<FakePlatform>,
    /// Entry points, as the bot layer holds them
    pub service: Arc<SuggestionService>,
    /// Shared live state
    pub registry: Arc<SuggestionRegistry>,
    /// Staff poll manager inside `service`
    pub polls: Arc<StaffPollManager>,
    /// Resolution publisher inside `service`
    pub publisher: Arc<ResolutionPublisher>,
    /// Threshold watcher inside `service`
    pub watcher: Arc<ThresholdWatcher>,
    /// In-memory archive
    pub db: DatabaseConnection,
}

impl TestHarness {
    /// Builds the lifecycle with `staff` as the staff role's members.
    pub async fn new(staff: &[u64]) -> Result<Self> {
        let platform = Arc::new(FakePlatform::new());
        let dyn_platform: Arc<dyn ChatPlatform> = Arc::clone(&platform) as Arc<dyn ChatPlatform>;
        Self::build(platform, dyn_platform, staff).await
    }

    /// Like [`Self::new`], but the first staff poll post is held open until
    /// the returned handle releases it.
    pub async fn with_held_staff_post(staff: &[u64]) -> Result<(Self, Arc<HeldStaffPost>)> {
        let platform = Arc::new(FakePlatform::new());
        let held = Arc::new(HeldStaffPost {
            inner: Arc::clone(&platform),
            armed: AtomicBool::new(true),
            posted: Notify::new(),
            release: Notify::new(),
        });
        let dyn_platform: Arc<dyn ChatPlatform> = Arc::clone(&held) as Arc<dyn ChatPlatform>;
        let harness = Self::build(platform, dyn_platform, staff).await?;
        Ok((harness, held))
    }

    async fn build(
        platform: Arc<FakePlatform>,
        service_platform: Arc<dyn ChatPlatform>,
        staff: &[u64],
    ) -> Result<Self> {
        init_test_tracing();
        let db = setup_test_db().await?;
        platform.set_role_members(STAFF_ROLE, staff);

        let service = Arc::new(SuggestionService::new(
            service_platform,
            db.clone(),
            test_settings(),
        ));

        Ok(Self {
            registry: Arc::clone(&service.registry),
            polls: Arc::clone(&service.polls),
            publisher: Arc::clone(&service.publisher),
            watcher: Arc::clone(&service.watcher),
            platform,
            service,
            db,
        })
    }

    /// Submits a suggestion by user 1.
    pub async fn submit(&self) -> Result<SuggestionId> {
        self.service
            .submit_at(UserId(1), "Add a music channel", "Please", test_now())
            .await
    }

    /// Submits a suggestion and claims its escalation, without opening a poll.
    pub async fn submit_in_review(&self) -> Result<SuggestionId> {
        let id = self.submit().await?;
        self.registry
            .transition(id, Stage::Open, Stage::StaffReview)
            .await?;
        Ok(id)
    }

    /// Adds upvotes from `users` to the suggestion's message.
    pub fn upvote(&self, id: SuggestionId, users: &[u64]) {
        let message = MessageRef::new(SUGGESTION_CHANNEL.0, id.0);
        for user in users {
            self.platform.react(message, Marker::Upvote, *user);
        }
    }
}
