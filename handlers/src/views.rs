//! Materialized-view seams for the query side.
//!
//! Query handlers never read event streams directly; they read denormalized
//! views maintained elsewhere by projectors. Each view is a small trait so
//! tests can inject in-memory fakes and deployments can back them with
//! whatever store the projector writes to. View rows are loosely-typed
//! [`serde_json::Value`] documents, matching the event payloads they are
//! folded from.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a view backend.
#[derive(Error, Debug)]
pub enum ViewError {
    /// The backing store failed.
    #[error("view storage error: {0}")]
    Storage(String),
}

/// User profiles, keyed by user id.
#[async_trait]
pub trait UserView: Send + Sync {
    /// The user document, if known.
    async fn get(&self, user_id: &str) -> Result<Option<Value>, ViewError>;
    /// Look a user up by email.
    async fn get_by_email(&self, email: &str) -> Result<Option<Value>, ViewError>;
    /// Total users.
    async fn count(&self) -> Result<u64, ViewError>;
}

/// Community posts.
#[async_trait]
pub trait PostView: Send + Sync {
    /// The post document, if known.
    async fn get(&self, post_id: &str) -> Result<Option<Value>, ViewError>;
    /// A page of posts, newest first.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Value>, ViewError>;
    /// Posts authored by one user, newest first.
    async fn by_user(&self, user_id: &str) -> Result<Vec<Value>, ViewError>;
    /// Posts whose title or content contains the query text.
    async fn search(&self, query: &str) -> Result<Vec<Value>, ViewError>;
    /// Posts ranked by recent engagement.
    async fn trending(&self, limit: usize) -> Result<Vec<Value>, ViewError>;
    /// Total posts.
    async fn count(&self) -> Result<u64, ViewError>;
}

/// Comments, grouped under their post.
#[async_trait]
pub trait CommentView: Send + Sync {
    /// All comments on one post, oldest first.
    async fn for_post(&self, post_id: &str) -> Result<Vec<Value>, ViewError>;
    /// Total comments.
    async fn count(&self) -> Result<u64, ViewError>;
}

/// Votes, grouped under their post.
#[async_trait]
pub trait VoteView: Send + Sync {
    /// All votes on one post.
    async fn for_post(&self, post_id: &str) -> Result<Vec<Value>, ViewError>;
    /// Total votes.
    async fn count(&self) -> Result<u64, ViewError>;
}

/// Link-scan requests and verdicts.
#[async_trait]
pub trait LinkScanView: Send + Sync {
    /// The scan document, if known.
    async fn get(&self, scan_id: &str) -> Result<Option<Value>, ViewError>;
    /// The most recent scans, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<Value>, ViewError>;
    /// Total scans.
    async fn count(&self) -> Result<u64, ViewError>;
}

/// Chat conversations.
#[async_trait]
pub trait ConversationView: Send + Sync {
    /// The conversation document, if known.
    async fn get(&self, conversation_id: &str) -> Result<Option<Value>, ViewError>;
    /// Conversations a user participates in.
    async fn for_user(&self, user_id: &str) -> Result<Vec<Value>, ViewError>;
    /// Total conversations.
    async fn count(&self) -> Result<u64, ViewError>;
}

/// Chat messages, grouped under their conversation.
#[async_trait]
pub trait MessageView: Send + Sync {
    /// All messages in one conversation, oldest first.
    async fn for_conversation(&self, conversation_id: &str) -> Result<Vec<Value>, ViewError>;
    /// Total messages.
    async fn count(&self) -> Result<u64, ViewError>;
}

/// Published news articles.
#[async_trait]
pub trait NewsView: Send + Sync {
    /// The article document, if known.
    async fn get(&self, article_id: &str) -> Result<Option<Value>, ViewError>;
    /// The most recent articles, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<Value>, ViewError>;
    /// Category names ranked by article count.
    async fn top_categories(&self, limit: usize) -> Result<Vec<Value>, ViewError>;
    /// Total articles.
    async fn count(&self) -> Result<u64, ViewError>;
}

/// System alerts.
#[async_trait]
pub trait AlertView: Send + Sync {
    /// Alerts not yet resolved, newest first.
    async fn active(&self) -> Result<Vec<Value>, ViewError>;
    /// Unresolved alert count.
    async fn active_count(&self) -> Result<u64, ViewError>;
    /// Total alerts ever raised.
    async fn count(&self) -> Result<u64, ViewError>;
}

/// Administrative audit log.
#[async_trait]
pub trait AuditLogView: Send + Sync {
    /// The most recent audit entries, newest first.
    async fn recent(&self, limit: usize, offset: usize) -> Result<Vec<Value>, ViewError>;
    /// Total audit entries.
    async fn count(&self) -> Result<u64, ViewError>;
}

/// The full bundle of view handles a [`QueryHandler`] reads from.
///
/// [`QueryHandler`]: crate::query::QueryHandler
#[derive(Clone)]
pub struct Views {
    /// User profiles.
    pub users: Arc<dyn UserView>,
    /// Community posts.
    pub posts: Arc<dyn PostView>,
    /// Comments.
    pub comments: Arc<dyn CommentView>,
    /// Votes.
    pub votes: Arc<dyn VoteView>,
    /// Link scans.
    pub link_scans: Arc<dyn LinkScanView>,
    /// Chat conversations.
    pub conversations: Arc<dyn ConversationView>,
    /// Chat messages.
    pub messages: Arc<dyn MessageView>,
    /// News articles.
    pub news: Arc<dyn NewsView>,
    /// System alerts.
    pub alerts: Arc<dyn AlertView>,
    /// Audit log.
    pub audit_log: Arc<dyn AuditLogView>,
}

impl std::fmt::Debug for Views {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Views").finish_non_exhaustive()
    }
}
