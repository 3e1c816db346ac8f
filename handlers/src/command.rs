//! Command side of the CQRS split.
//!
//! A command is a typed write intent. Each one translates into exactly one
//! event appended to a family stream via the facade — handlers read no
//! state, validate no business invariants beyond the payload shape, and
//! never touch materialized views (projectors do that downstream).
//!
//! [`Command`] is an exhaustive sum type, so an unhandled command is a
//! compile error. The string-keyed surface the surrounding services speak
//! (`handleCommand(commandType, payload)`) survives at the edge as
//! [`Command::parse`], which fails fast on unknown tags — that is a
//! programmer error, not a degradable condition.

use chrono::Utc;
use eventline_store::EventStore;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors from command parsing and dispatch.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command-type tag is not recognized. Caller/handler mismatch;
    /// fix the code, don't retry.
    #[error("Unknown command type: {0}")]
    UnknownCommandType(String),

    /// The tag was recognized but the payload doesn't fit its shape.
    #[error("Invalid payload for '{kind}': {reason}")]
    InvalidPayload {
        /// The command-type tag.
        kind: String,
        /// What serde rejected.
        reason: String,
    },
}

/// Direction of a post vote.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    /// Upvote.
    Up,
    /// Downvote.
    Down,
}

macro_rules! payload {
    ($(#[$doc:meta])* $name:ident { $($(#[$fdoc:meta])* $field:ident : $ty:ty),* $(,)? }) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            $($(#[$fdoc])* pub $field: $ty,)*
        }
    };
}

payload! {
    /// Register a new user.
    CreateUser {
        /// Caller-supplied id; a fresh UUID is assigned when absent.
        #[serde(default)] user_id: Option<String>,
        /// The user's email address.
        email: String,
        /// Optional display username.
        #[serde(default)] username: Option<String>,
    }
}

payload! {
    /// Change fields on an existing user's profile.
    UpdateUserProfile {
        /// The user being updated.
        user_id: String,
        /// Partial document of changed fields.
        updates: Value,
    }
}

payload! {
    /// Record a login.
    UserLogin {
        /// The user logging in.
        user_id: String,
        /// Client address, if known.
        #[serde(default)] ip_address: Option<String>,
        /// Client user agent, if known.
        #[serde(default)] user_agent: Option<String>,
    }
}

payload! {
    /// Publish a community post.
    CreatePost {
        /// Caller-supplied id; a fresh UUID is assigned when absent.
        #[serde(default)] post_id: Option<String>,
        /// The author.
        user_id: String,
        /// Post title.
        title: String,
        /// Post body.
        content: String,
        /// Category tag.
        category: String,
    }
}

payload! {
    /// Edit an existing post.
    UpdatePost {
        /// The post being edited.
        post_id: String,
        /// The editor, if known.
        #[serde(default)] user_id: Option<String>,
        /// Partial document of changed fields.
        updates: Value,
    }
}

payload! {
    /// Remove a post.
    DeletePost {
        /// The post being removed.
        post_id: String,
        /// Who removed it.
        user_id: String,
    }
}

payload! {
    /// Comment on a post.
    CreateComment {
        /// Caller-supplied id; a fresh UUID is assigned when absent.
        #[serde(default)] comment_id: Option<String>,
        /// The post commented on.
        post_id: String,
        /// The commenter.
        user_id: String,
        /// Comment body.
        content: String,
    }
}

payload! {
    /// Vote on a post.
    Vote {
        /// The post voted on.
        post_id: String,
        /// The voter.
        user_id: String,
        /// Up or down.
        direction: VoteDirection,
    }
}

payload! {
    /// Request a link scan.
    ScanLink {
        /// Caller-supplied id; a fresh UUID is assigned when absent.
        #[serde(default)] scan_id: Option<String>,
        /// The URL to scan.
        url: String,
        /// Who asked for the scan.
        #[serde(default)] requested_by: Option<String>,
    }
}

payload! {
    /// Record a finished link scan.
    LinkScanCompleted {
        /// The scan that finished.
        scan_id: String,
        /// The scanned URL.
        #[serde(default)] url: Option<String>,
        /// Scanner verdict, e.g. `"safe"` / `"malicious"`.
        verdict: String,
        /// Numeric risk score, if the scanner produced one.
        #[serde(default)] score: Option<f64>,
    }
}

payload! {
    /// Send a chat message.
    SendChatMessage {
        /// Caller-supplied id; a fresh UUID is assigned when absent.
        #[serde(default)] message_id: Option<String>,
        /// The conversation the message belongs to.
        conversation_id: String,
        /// The sender.
        user_id: String,
        /// Message body.
        content: String,
    }
}

payload! {
    /// Record an AI-generated chat response.
    AiResponse {
        /// Caller-supplied id; a fresh UUID is assigned when absent.
        #[serde(default)] message_id: Option<String>,
        /// The conversation the response belongs to.
        conversation_id: String,
        /// Response body.
        content: String,
        /// The model that produced it, if known.
        #[serde(default)] model: Option<String>,
    }
}

payload! {
    /// Publish a news article.
    CreateNewsArticle {
        /// Caller-supplied id; a fresh UUID is assigned when absent.
        #[serde(default)] article_id: Option<String>,
        /// Article title.
        title: String,
        /// Article body.
        content: String,
        /// Originating outlet/feed, if known.
        #[serde(default)] source: Option<String>,
        /// Category tag, if any.
        #[serde(default)] category: Option<String>,
    }
}

payload! {
    /// Record an administrative action.
    AdminAction {
        /// Caller-supplied id; a fresh UUID is assigned when absent.
        #[serde(default)] action_id: Option<String>,
        /// The administrator.
        admin_id: String,
        /// What was done.
        action: String,
        /// What it was done to, if applicable.
        #[serde(default)] target: Option<String>,
    }
}

payload! {
    /// Raise a system alert.
    SystemAlert {
        /// Caller-supplied id; a fresh UUID is assigned when absent.
        #[serde(default)] alert_id: Option<String>,
        /// Alert severity, e.g. `"critical"`.
        severity: String,
        /// Alert message.
        message: String,
    }
}

/// All write intents the system accepts. Adding a variant without handling
/// it everywhere is a compile error — that is the point.
#[derive(Clone, Debug)]
pub enum Command {
    /// Register a new user.
    CreateUser(CreateUser),
    /// Change fields on a user's profile.
    UpdateUserProfile(UpdateUserProfile),
    /// Record a login.
    UserLogin(UserLogin),
    /// Publish a community post.
    CreatePost(CreatePost),
    /// Edit an existing post.
    UpdatePost(UpdatePost),
    /// Remove a post.
    DeletePost(DeletePost),
    /// Comment on a post.
    CreateComment(CreateComment),
    /// Vote on a post.
    Vote(Vote),
    /// Request a link scan.
    ScanLink(ScanLink),
    /// Record a finished link scan.
    LinkScanCompleted(LinkScanCompleted),
    /// Send a chat message.
    SendChatMessage(SendChatMessage),
    /// Record an AI-generated chat response.
    AiResponse(AiResponse),
    /// Publish a news article.
    CreateNewsArticle(CreateNewsArticle),
    /// Record an administrative action.
    AdminAction(AdminAction),
    /// Raise a system alert.
    SystemAlert(SystemAlert),
}

fn from_params<T: serde::de::DeserializeOwned>(kind: &str, params: Value) -> Result<T, CommandError> {
    serde_json::from_value(params).map_err(|e| CommandError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

impl Command {
    /// Parse the string-keyed dispatch surface into a typed command.
    ///
    /// # Errors
    ///
    /// - [`CommandError::UnknownCommandType`] for an unrecognized tag
    /// - [`CommandError::InvalidPayload`] when the payload doesn't fit
    pub fn parse(kind: &str, params: Value) -> Result<Self, CommandError> {
        let command = match kind {
            "createUser" => Self::CreateUser(from_params(kind, params)?),
            "updateUserProfile" => Self::UpdateUserProfile(from_params(kind, params)?),
            "userLogin" => Self::UserLogin(from_params(kind, params)?),
            "createPost" => Self::CreatePost(from_params(kind, params)?),
            "updatePost" => Self::UpdatePost(from_params(kind, params)?),
            "deletePost" => Self::DeletePost(from_params(kind, params)?),
            "createComment" => Self::CreateComment(from_params(kind, params)?),
            "vote" => Self::Vote(from_params(kind, params)?),
            "scanLink" => Self::ScanLink(from_params(kind, params)?),
            "linkScanCompleted" => Self::LinkScanCompleted(from_params(kind, params)?),
            "sendChatMessage" => Self::SendChatMessage(from_params(kind, params)?),
            "aiResponse" => Self::AiResponse(from_params(kind, params)?),
            "createNewsArticle" => Self::CreateNewsArticle(from_params(kind, params)?),
            "adminAction" => Self::AdminAction(from_params(kind, params)?),
            "systemAlert" => Self::SystemAlert(from_params(kind, params)?),
            _ => return Err(CommandError::UnknownCommandType(kind.to_string())),
        };
        Ok(command)
    }

    /// The event type this command produces.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::CreateUser(_) => "user:created",
            Self::UpdateUserProfile(_) => "user:profile_updated",
            Self::UserLogin(_) => "auth:login",
            Self::CreatePost(_) => "community:post_created",
            Self::UpdatePost(_) => "community:post_updated",
            Self::DeletePost(_) => "community:post_deleted",
            Self::CreateComment(_) => "community:comment_created",
            Self::Vote(_) => "community:post_voted",
            Self::ScanLink(_) => "link:scan_requested",
            Self::LinkScanCompleted(_) => "link:scan_completed",
            Self::SendChatMessage(_) => "chat:message_sent",
            Self::AiResponse(_) => "chat:ai_response_generated",
            Self::CreateNewsArticle(_) => "news:article_published",
            Self::AdminAction(_) => "admin:action_performed",
            Self::SystemAlert(_) => "system:alert_created",
        }
    }

    /// The family stream this command's event is appended to.
    #[must_use]
    pub const fn stream(&self) -> &'static str {
        match self {
            Self::CreateUser(_) | Self::UpdateUserProfile(_) => "users",
            Self::UserLogin(_) => "auth",
            Self::CreatePost(_)
            | Self::UpdatePost(_)
            | Self::DeletePost(_)
            | Self::CreateComment(_)
            | Self::Vote(_) => "community",
            Self::ScanLink(_) | Self::LinkScanCompleted(_) => "links",
            Self::SendChatMessage(_) | Self::AiResponse(_) => "chat",
            Self::CreateNewsArticle(_) => "news",
            Self::AdminAction(_) => "admin",
            Self::SystemAlert(_) => "system",
        }
    }
}

/// Minimal command acknowledgement: `success` plus the derived entity id(s).
///
/// Serializes flat, e.g. `{ "success": true, "postId": "..." }` — never the
/// full event or any derived state.
#[derive(Clone, Debug, Serialize)]
pub struct CommandAck {
    /// Always `true`: appends never fail (see the facade's durability
    /// tradeoff) and parse errors are surfaced before an ack exists.
    pub success: bool,
    /// Entity ids keyed by their JSON field name (`userId`, `postId`, …).
    #[serde(flatten)]
    pub ids: BTreeMap<String, String>,
}

impl CommandAck {
    fn one(key: &str, id: String) -> Self {
        let mut ids = BTreeMap::new();
        ids.insert(key.to_string(), id);
        Self { success: true, ids }
    }

    /// Look up an entity id by its JSON field name.
    #[must_use]
    pub fn id(&self, key: &str) -> Option<&str> {
        self.ids.get(key).map(String::as_str)
    }
}

/// Use the caller's id when supplied, otherwise mint a fresh UUID.
fn id_or_fresh(id: Option<String>) -> String {
    id.unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Translates commands into events and appends them via the facade.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    store: Arc<EventStore>,
}

impl CommandHandler {
    /// Create a handler writing through the given facade.
    #[must_use]
    pub const fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    /// The string-keyed dispatch surface: parse then handle.
    ///
    /// # Errors
    ///
    /// - [`CommandError::UnknownCommandType`] for an unrecognized tag
    /// - [`CommandError::InvalidPayload`] when the payload doesn't fit
    pub async fn handle_command(&self, kind: &str, params: Value) -> Result<CommandAck, CommandError> {
        let command = Command::parse(kind, params)?;
        Ok(self.handle(command).await)
    }

    /// Handle a typed command.
    ///
    /// Infallible by design: the facade's append never fails, and every
    /// command derives exactly one event. The ack carries only the entity
    /// id(s) the caller needs.
    #[allow(clippy::too_many_lines)] // One arm per command variant, kept together
    pub async fn handle(&self, command: Command) -> CommandAck {
        let event_type = command.event_type();
        let stream = command.stream();
        let now = Utc::now();

        let (ack, data) = match command {
            Command::CreateUser(cmd) => {
                let user_id = id_or_fresh(cmd.user_id);
                let data = json!({
                    "userId": &user_id,
                    "email": cmd.email,
                    "username": cmd.username,
                    "createdAt": now,
                });
                (CommandAck::one("userId", user_id), data)
            }
            Command::UpdateUserProfile(cmd) => {
                let data = json!({
                    "userId": &cmd.user_id,
                    "updates": cmd.updates,
                    "updatedAt": now,
                });
                (CommandAck::one("userId", cmd.user_id), data)
            }
            Command::UserLogin(cmd) => {
                let data = json!({
                    "userId": &cmd.user_id,
                    "ipAddress": cmd.ip_address,
                    "userAgent": cmd.user_agent,
                    "timestamp": now,
                });
                (CommandAck::one("userId", cmd.user_id), data)
            }
            Command::CreatePost(cmd) => {
                let post_id = id_or_fresh(cmd.post_id);
                let data = json!({
                    "postId": &post_id,
                    "userId": cmd.user_id,
                    "title": cmd.title,
                    "content": cmd.content,
                    "category": cmd.category,
                    "createdAt": now,
                });
                (CommandAck::one("postId", post_id), data)
            }
            Command::UpdatePost(cmd) => {
                let data = json!({
                    "postId": &cmd.post_id,
                    "userId": cmd.user_id,
                    "updates": cmd.updates,
                    "updatedAt": now,
                });
                (CommandAck::one("postId", cmd.post_id), data)
            }
            Command::DeletePost(cmd) => {
                let data = json!({
                    "postId": &cmd.post_id,
                    "userId": cmd.user_id,
                    "timestamp": now,
                });
                (CommandAck::one("postId", cmd.post_id), data)
            }
            Command::CreateComment(cmd) => {
                let comment_id = id_or_fresh(cmd.comment_id);
                let data = json!({
                    "commentId": &comment_id,
                    "postId": cmd.post_id,
                    "userId": cmd.user_id,
                    "content": cmd.content,
                    "createdAt": now,
                });
                (CommandAck::one("commentId", comment_id), data)
            }
            Command::Vote(cmd) => {
                let data = json!({
                    "postId": &cmd.post_id,
                    "userId": cmd.user_id,
                    "direction": cmd.direction,
                    "timestamp": now,
                });
                (CommandAck::one("postId", cmd.post_id), data)
            }
            Command::ScanLink(cmd) => {
                let scan_id = id_or_fresh(cmd.scan_id);
                let data = json!({
                    "scanId": &scan_id,
                    "url": cmd.url,
                    "requestedBy": cmd.requested_by,
                    "createdAt": now,
                });
                (CommandAck::one("scanId", scan_id), data)
            }
            Command::LinkScanCompleted(cmd) => {
                let data = json!({
                    "scanId": &cmd.scan_id,
                    "url": cmd.url,
                    "verdict": cmd.verdict,
                    "score": cmd.score,
                    "timestamp": now,
                });
                (CommandAck::one("scanId", cmd.scan_id), data)
            }
            Command::SendChatMessage(cmd) => {
                let message_id = id_or_fresh(cmd.message_id);
                let data = json!({
                    "messageId": &message_id,
                    "conversationId": cmd.conversation_id,
                    "userId": cmd.user_id,
                    "content": cmd.content,
                    "createdAt": now,
                });
                (CommandAck::one("messageId", message_id), data)
            }
            Command::AiResponse(cmd) => {
                let message_id = id_or_fresh(cmd.message_id);
                let data = json!({
                    "messageId": &message_id,
                    "conversationId": cmd.conversation_id,
                    "content": cmd.content,
                    "model": cmd.model,
                    "createdAt": now,
                });
                (CommandAck::one("messageId", message_id), data)
            }
            Command::CreateNewsArticle(cmd) => {
                let article_id = id_or_fresh(cmd.article_id);
                let data = json!({
                    "articleId": &article_id,
                    "title": cmd.title,
                    "content": cmd.content,
                    "source": cmd.source,
                    "category": cmd.category,
                    "createdAt": now,
                });
                (CommandAck::one("articleId", article_id), data)
            }
            Command::AdminAction(cmd) => {
                let action_id = id_or_fresh(cmd.action_id);
                let data = json!({
                    "actionId": &action_id,
                    "adminId": cmd.admin_id,
                    "action": cmd.action,
                    "target": cmd.target,
                    "timestamp": now,
                });
                (CommandAck::one("actionId", action_id), data)
            }
            Command::SystemAlert(cmd) => {
                let alert_id = id_or_fresh(cmd.alert_id);
                let data = json!({
                    "alertId": &alert_id,
                    "severity": cmd.severity,
                    "message": cmd.message,
                    "timestamp": now,
                });
                (CommandAck::one("alertId", alert_id), data)
            }
        };

        let receipt = self
            .store
            .append_event(stream.into(), event_type, data, None)
            .await;
        tracing::debug!(
            stream = stream,
            event_type = event_type,
            source = %receipt.source,
            "Command handled"
        );
        ack
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Panics: tests fail loudly on broken fixtures
mod tests {
    use super::*;
    use eventline_core::stream::ReadOptions;
    use eventline_store::StoreConfig;
    use eventline_testing::InMemoryStreamStore;

    fn handler() -> (CommandHandler, Arc<EventStore>) {
        let backend = Arc::new(InMemoryStreamStore::new());
        let store = Arc::new(EventStore::new(StoreConfig::default(), backend));
        (CommandHandler::new(store.clone()), store)
    }

    #[tokio::test]
    async fn create_post_end_to_end() {
        let (handler, store) = handler();
        store.connect().await;

        let ack = handler
            .handle_command(
                "createPost",
                json!({ "userId": "u1", "title": "T", "content": "C", "category": "news" }),
            )
            .await
            .expect("known command should parse");

        assert!(ack.success);
        let post_id = ack.id("postId").expect("ack should carry postId");
        assert!(Uuid::parse_str(post_id).is_ok());

        let events = store
            .read_events("community".into(), ReadOptions::default())
            .await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "community:post_created");
        assert_eq!(events[0].data["title"], "T");
    }

    #[tokio::test]
    async fn unknown_command_type_fails_fast() {
        let (handler, _store) = handler();
        let result = handler.handle_command("doesNotExist", json!({})).await;
        assert!(matches!(
            result,
            Err(CommandError::UnknownCommandType(kind)) if kind == "doesNotExist"
        ));
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_with_the_kind() {
        let (handler, _store) = handler();
        // createPost requires title/content/category.
        let result = handler
            .handle_command("createPost", json!({ "userId": "u1" }))
            .await;
        assert!(matches!(
            result,
            Err(CommandError::InvalidPayload { kind, .. }) if kind == "createPost"
        ));
    }

    #[tokio::test]
    async fn caller_supplied_id_is_honored() {
        let (handler, _store) = handler();
        let ack = handler
            .handle_command(
                "createUser",
                json!({ "userId": "fixed-1", "email": "a@b.com" }),
            )
            .await
            .expect("known command should parse");
        assert_eq!(ack.id("userId"), Some("fixed-1"));
    }

    #[tokio::test]
    async fn missing_id_gets_a_fresh_uuid_each_call() {
        let (handler, _store) = handler();
        let first = handler
            .handle_command("createUser", json!({ "email": "a@b.com" }))
            .await
            .expect("known command should parse");
        let second = handler
            .handle_command("createUser", json!({ "email": "a@b.com" }))
            .await
            .expect("known command should parse");

        let a = first.id("userId").expect("ack should carry userId");
        let b = second.id("userId").expect("ack should carry userId");
        assert!(Uuid::parse_str(a).is_ok());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn commands_route_to_family_streams() {
        let (handler, store) = handler();
        store.connect().await;

        handler
            .handle_command("systemAlert", json!({ "severity": "critical", "message": "disk full" }))
            .await
            .expect("known command should parse");
        handler
            .handle_command("userLogin", json!({ "userId": "u1" }))
            .await
            .expect("known command should parse");

        let system = store.read_events("system".into(), ReadOptions::default()).await;
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].event_type, "system:alert_created");
        assert_eq!(system[0].data["severity"], "critical");

        let auth = store.read_events("auth".into(), ReadOptions::default()).await;
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].event_type, "auth:login");
    }

    #[tokio::test]
    async fn commands_succeed_during_an_outage() {
        let backend = Arc::new(InMemoryStreamStore::new());
        backend.set_available(false);
        let store = Arc::new(EventStore::new(StoreConfig::default(), backend));
        let handler = CommandHandler::new(store.clone());

        let ack = handler
            .handle_command("createComment", json!({ "postId": "p1", "userId": "u1", "content": "hi" }))
            .await
            .expect("known command should parse");

        // Degraded durability is invisible in the ack; the stats betray it.
        assert!(ack.success);
        assert_eq!(store.stats().await.fallback_used, 1);
    }

    #[test]
    fn ack_serializes_flat() {
        let ack = CommandAck::one("postId", "p-1".to_string());
        let json = serde_json::to_value(&ack).unwrap_or(Value::Null);
        assert_eq!(json["success"], true);
        assert_eq!(json["postId"], "p-1");
    }

    #[test]
    fn every_command_maps_to_its_event_type() {
        let cases: Vec<(Command, &str, &str)> = vec![
            (
                Command::parse("vote", json!({ "postId": "p", "userId": "u", "direction": "up" }))
                    .expect("vote should parse"),
                "community:post_voted",
                "community",
            ),
            (
                Command::parse("scanLink", json!({ "url": "https://x" }))
                    .expect("scanLink should parse"),
                "link:scan_requested",
                "links",
            ),
            (
                Command::parse("aiResponse", json!({ "conversationId": "c", "content": "hi" }))
                    .expect("aiResponse should parse"),
                "chat:ai_response_generated",
                "chat",
            ),
            (
                Command::parse("adminAction", json!({ "adminId": "a", "action": "ban" }))
                    .expect("adminAction should parse"),
                "admin:action_performed",
                "admin",
            ),
        ];

        for (command, event_type, stream) in cases {
            assert_eq!(command.event_type(), event_type);
            assert_eq!(command.stream(), stream);
        }
    }
}
