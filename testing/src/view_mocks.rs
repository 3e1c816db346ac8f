//! In-memory materialized-view fakes for query-handler tests.

use async_trait::async_trait;
use eventline_handlers::views::{
    AlertView, AuditLogView, CommentView, ConversationView, LinkScanView, MessageView, NewsView,
    PostView, UserView, ViewError, Views, VoteView,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Rows = Mutex<Vec<(String, Value)>>;

/// One in-memory store backing every view trait.
///
/// Rows are `(key, document)` pairs in insertion order; point lookups match
/// on the key, grouped lookups (comments under a post, messages under a
/// conversation) also match on the key. Seed rows with the `insert_*`
/// methods, flip [`set_failing`] to make every view call error, and hand the
/// result to a query handler via [`to_views`]:
///
/// ```
/// use std::sync::Arc;
/// use eventline_testing::InMemoryViews;
///
/// let views = Arc::new(InMemoryViews::new());
/// views.insert_user("u1", serde_json::json!({ "email": "a@b.com" }));
/// let bundle = views.to_views();
/// ```
///
/// [`set_failing`]: InMemoryViews::set_failing
/// [`to_views`]: InMemoryViews::to_views
#[derive(Debug, Default)]
pub struct InMemoryViews {
    users: Rows,
    posts: Rows,
    comments: Rows,
    votes: Rows,
    link_scans: Rows,
    conversations: Rows,
    messages: Rows,
    news: Rows,
    alerts: Rows,
    audit: Rows,
    failing: AtomicBool,
}

fn insert(rows: &Rows, key: &str, doc: Value) {
    if let Ok(mut rows) = rows.lock() {
        rows.push((key.to_string(), doc));
    }
}

impl InMemoryViews {
    /// Create an empty, healthy view store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While failing, every view call returns [`ViewError::Storage`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Seed a user document keyed by user id.
    pub fn insert_user(&self, user_id: &str, doc: Value) {
        insert(&self.users, user_id, doc);
    }

    /// Seed a post document keyed by post id.
    pub fn insert_post(&self, post_id: &str, doc: Value) {
        insert(&self.posts, post_id, doc);
    }

    /// Seed a comment document keyed by its post id.
    pub fn insert_comment(&self, post_id: &str, doc: Value) {
        insert(&self.comments, post_id, doc);
    }

    /// Seed a vote document keyed by its post id.
    pub fn insert_vote(&self, post_id: &str, doc: Value) {
        insert(&self.votes, post_id, doc);
    }

    /// Seed a link-scan document keyed by scan id.
    pub fn insert_link_scan(&self, scan_id: &str, doc: Value) {
        insert(&self.link_scans, scan_id, doc);
    }

    /// Seed a conversation document keyed by conversation id.
    pub fn insert_conversation(&self, conversation_id: &str, doc: Value) {
        insert(&self.conversations, conversation_id, doc);
    }

    /// Seed a message document keyed by its conversation id.
    pub fn insert_message(&self, conversation_id: &str, doc: Value) {
        insert(&self.messages, conversation_id, doc);
    }

    /// Seed a news article keyed by article id.
    pub fn insert_news(&self, article_id: &str, doc: Value) {
        insert(&self.news, article_id, doc);
    }

    /// Seed an active alert keyed by alert id.
    pub fn insert_alert(&self, alert_id: &str, doc: Value) {
        insert(&self.alerts, alert_id, doc);
    }

    /// Seed an audit entry keyed by action id.
    pub fn insert_audit(&self, action_id: &str, doc: Value) {
        insert(&self.audit, action_id, doc);
    }

    /// Bundle this store into the [`Views`] handle query handlers take.
    #[must_use]
    pub fn to_views(self: Arc<Self>) -> Views {
        Views {
            users: self.clone(),
            posts: self.clone(),
            comments: self.clone(),
            votes: self.clone(),
            link_scans: self.clone(),
            conversations: self.clone(),
            messages: self.clone(),
            news: self.clone(),
            alerts: self.clone(),
            audit_log: self,
        }
    }

    fn check(&self) -> Result<(), ViewError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ViewError::Storage("simulated view failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn rows(&self, rows: &Rows) -> Result<Vec<(String, Value)>, ViewError> {
        self.check()?;
        rows.lock()
            .map(|rows| rows.clone())
            .map_err(|e| ViewError::Storage(e.to_string()))
    }

    fn get(&self, rows: &Rows, key: &str) -> Result<Option<Value>, ViewError> {
        Ok(self
            .rows(rows)?
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, doc)| doc))
    }

    fn grouped(&self, rows: &Rows, key: &str) -> Result<Vec<Value>, ViewError> {
        Ok(self
            .rows(rows)?
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, doc)| doc)
            .collect())
    }

    fn newest_first(&self, rows: &Rows, limit: usize, offset: usize) -> Result<Vec<Value>, ViewError> {
        Ok(self
            .rows(rows)?
            .into_iter()
            .rev()
            .skip(offset)
            .take(limit)
            .map(|(_, doc)| doc)
            .collect())
    }

    fn count(&self, rows: &Rows) -> Result<u64, ViewError> {
        let rows = self.rows(rows)?;
        Ok(u64::try_from(rows.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl UserView for InMemoryViews {
    async fn get(&self, user_id: &str) -> Result<Option<Value>, ViewError> {
        Self::get(self, &self.users, user_id)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Value>, ViewError> {
        Ok(self
            .rows(&self.users)?
            .into_iter()
            .find(|(_, doc)| doc.get("email").and_then(Value::as_str) == Some(email))
            .map(|(_, doc)| doc))
    }

    async fn count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.users)
    }
}

#[async_trait]
impl PostView for InMemoryViews {
    async fn get(&self, post_id: &str) -> Result<Option<Value>, ViewError> {
        Self::get(self, &self.posts, post_id)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Value>, ViewError> {
        self.newest_first(&self.posts, limit, offset)
    }

    async fn by_user(&self, user_id: &str) -> Result<Vec<Value>, ViewError> {
        Ok(self
            .rows(&self.posts)?
            .into_iter()
            .rev()
            .filter(|(_, doc)| doc.get("userId").and_then(Value::as_str) == Some(user_id))
            .map(|(_, doc)| doc)
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<Value>, ViewError> {
        let needle = query.to_lowercase();
        Ok(self
            .rows(&self.posts)?
            .into_iter()
            .filter(|(_, doc)| {
                ["title", "content"].iter().any(|field| {
                    doc.get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
            })
            .map(|(_, doc)| doc)
            .collect())
    }

    async fn trending(&self, limit: usize) -> Result<Vec<Value>, ViewError> {
        self.newest_first(&self.posts, limit, 0)
    }

    async fn count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.posts)
    }
}

#[async_trait]
impl CommentView for InMemoryViews {
    async fn for_post(&self, post_id: &str) -> Result<Vec<Value>, ViewError> {
        self.grouped(&self.comments, post_id)
    }

    async fn count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.comments)
    }
}

#[async_trait]
impl VoteView for InMemoryViews {
    async fn for_post(&self, post_id: &str) -> Result<Vec<Value>, ViewError> {
        self.grouped(&self.votes, post_id)
    }

    async fn count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.votes)
    }
}

#[async_trait]
impl LinkScanView for InMemoryViews {
    async fn get(&self, scan_id: &str) -> Result<Option<Value>, ViewError> {
        Self::get(self, &self.link_scans, scan_id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Value>, ViewError> {
        self.newest_first(&self.link_scans, limit, 0)
    }

    async fn count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.link_scans)
    }
}

#[async_trait]
impl ConversationView for InMemoryViews {
    async fn get(&self, conversation_id: &str) -> Result<Option<Value>, ViewError> {
        Self::get(self, &self.conversations, conversation_id)
    }

    async fn for_user(&self, user_id: &str) -> Result<Vec<Value>, ViewError> {
        Ok(self
            .rows(&self.conversations)?
            .into_iter()
            .filter(|(_, doc)| doc.get("userId").and_then(Value::as_str) == Some(user_id))
            .map(|(_, doc)| doc)
            .collect())
    }

    async fn count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.conversations)
    }
}

#[async_trait]
impl MessageView for InMemoryViews {
    async fn for_conversation(&self, conversation_id: &str) -> Result<Vec<Value>, ViewError> {
        self.grouped(&self.messages, conversation_id)
    }

    async fn count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.messages)
    }
}

#[async_trait]
impl NewsView for InMemoryViews {
    async fn get(&self, article_id: &str) -> Result<Option<Value>, ViewError> {
        Self::get(self, &self.news, article_id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Value>, ViewError> {
        self.newest_first(&self.news, limit, 0)
    }

    async fn top_categories(&self, limit: usize) -> Result<Vec<Value>, ViewError> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for (_, doc) in self.rows(&self.news)? {
            if let Some(category) = doc.get("category").and_then(Value::as_str) {
                match counts.iter_mut().find(|(name, _)| name == category) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((category.to_string(), 1)),
                }
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(counts
            .into_iter()
            .take(limit)
            .map(|(name, count)| serde_json::json!({ "category": name, "count": count }))
            .collect())
    }

    async fn count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.news)
    }
}

#[async_trait]
impl AlertView for InMemoryViews {
    async fn active(&self) -> Result<Vec<Value>, ViewError> {
        self.newest_first(&self.alerts, usize::MAX, 0)
    }

    async fn active_count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.alerts)
    }

    async fn count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.alerts)
    }
}

#[async_trait]
impl AuditLogView for InMemoryViews {
    async fn recent(&self, limit: usize, offset: usize) -> Result<Vec<Value>, ViewError> {
        self.newest_first(&self.audit, limit, offset)
    }

    async fn count(&self) -> Result<u64, ViewError> {
        Self::count(self, &self.audit)
    }
}
