//! Query side of the CQRS split.
//!
//! Queries read materialized views only — never event streams. [`Query`] is
//! the typed counterpart of the string-keyed `handleQuery(queryType, params)`
//! surface; [`QueryHandler`] resolves each variant against the injected
//! [`Views`] bundle and returns loosely-typed JSON documents, matching what
//! the views hold.

use crate::views::{ViewError, Views};
use eventline_store::EventStore;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_LIMIT: usize = 20;
const DASHBOARD_CATEGORY_LIMIT: usize = 5;

/// Errors from query parsing and resolution.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The query-type tag is not recognized.
    #[error("Unknown query type: {0}")]
    UnknownQueryType(String),

    /// The tag was recognized but a required parameter is missing or wrong.
    #[error("Invalid params for '{kind}': {reason}")]
    InvalidParams {
        /// The query-type tag.
        kind: String,
        /// What was wrong.
        reason: String,
    },

    /// The requested entity does not exist in the view.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity kind, e.g. `"Post"`.
        entity: &'static str,
        /// The id that missed.
        id: String,
    },

    /// A view backend failed mid-query.
    #[error("Failed to get {context}: {reason}")]
    View {
        /// What was being fetched.
        context: &'static str,
        /// The backend failure.
        reason: String,
    },
}

fn view_err(context: &'static str) -> impl FnOnce(ViewError) -> QueryError {
    move |error| QueryError::View {
        context,
        reason: error.to_string(),
    }
}

/// All read intents the system answers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    /// One user's profile.
    GetUserProfile {
        /// The user.
        user_id: String,
    },
    /// Look a user up by email.
    GetUserByEmail {
        /// The email address.
        email: String,
    },
    /// One post.
    GetPost {
        /// The post.
        post_id: String,
    },
    /// One post joined with its comments and vote tallies.
    GetPostWithComments {
        /// The post.
        post_id: String,
    },
    /// A page of posts, newest first.
    ListPosts {
        /// Page size.
        limit: usize,
        /// Page offset.
        offset: usize,
    },
    /// Posts authored by one user.
    ListPostsByUser {
        /// The author.
        user_id: String,
    },
    /// Full-text-ish search over posts.
    SearchPosts {
        /// The query text.
        query: String,
    },
    /// Posts ranked by recent engagement.
    GetTrendingPosts {
        /// How many to return.
        limit: usize,
    },
    /// One link scan.
    GetLinkScan {
        /// The scan.
        scan_id: String,
    },
    /// The most recent link scans.
    GetRecentLinkScans {
        /// How many to return.
        limit: usize,
    },
    /// One chat conversation.
    GetConversation {
        /// The conversation.
        conversation_id: String,
    },
    /// All messages in one conversation.
    GetConversationMessages {
        /// The conversation.
        conversation_id: String,
    },
    /// One news article.
    GetNewsArticle {
        /// The article.
        article_id: String,
    },
    /// The most recent news articles.
    GetRecentNews {
        /// How many to return.
        limit: usize,
    },
    /// Entity counts across every view.
    GetSystemStats,
    /// Per-dependency health, including the event store facade.
    GetSystemHealth,
    /// The admin dashboard aggregate: counts, alerts, recent audit entries.
    GetAdminDashboard,
    /// Event store facade counters.
    GetSystemMetrics,
    /// A page of the audit log.
    GetAuditLog {
        /// Page size.
        limit: usize,
        /// Page offset.
        offset: usize,
    },
}

fn require_str(kind: &str, params: &Value, field: &str) -> Result<String, QueryError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| QueryError::InvalidParams {
            kind: kind.to_string(),
            reason: format!("missing required field '{field}'"),
        })
}

fn usize_or(params: &Value, field: &str, default: usize) -> usize {
    params
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

impl Query {
    /// Parse the string-keyed dispatch surface into a typed query.
    ///
    /// Paging fields default to a limit of 20 and an offset of 0 when
    /// absent or malformed.
    ///
    /// # Errors
    ///
    /// - [`QueryError::UnknownQueryType`] for an unrecognized tag
    /// - [`QueryError::InvalidParams`] when a required field is missing
    pub fn parse(kind: &str, params: &Value) -> Result<Self, QueryError> {
        let query = match kind {
            "getUserProfile" => Self::GetUserProfile {
                user_id: require_str(kind, params, "userId")?,
            },
            "getUserByEmail" => Self::GetUserByEmail {
                email: require_str(kind, params, "email")?,
            },
            "getPost" => Self::GetPost {
                post_id: require_str(kind, params, "postId")?,
            },
            "getPostWithComments" => Self::GetPostWithComments {
                post_id: require_str(kind, params, "postId")?,
            },
            "listPosts" => Self::ListPosts {
                limit: usize_or(params, "limit", DEFAULT_LIMIT),
                offset: usize_or(params, "offset", 0),
            },
            "listPostsByUser" => Self::ListPostsByUser {
                user_id: require_str(kind, params, "userId")?,
            },
            "searchPosts" => Self::SearchPosts {
                query: require_str(kind, params, "query")?,
            },
            "getTrendingPosts" => Self::GetTrendingPosts {
                limit: usize_or(params, "limit", DEFAULT_LIMIT),
            },
            "getLinkScan" => Self::GetLinkScan {
                scan_id: require_str(kind, params, "scanId")?,
            },
            "getRecentLinkScans" => Self::GetRecentLinkScans {
                limit: usize_or(params, "limit", DEFAULT_LIMIT),
            },
            "getConversation" => Self::GetConversation {
                conversation_id: require_str(kind, params, "conversationId")?,
            },
            "getConversationMessages" => Self::GetConversationMessages {
                conversation_id: require_str(kind, params, "conversationId")?,
            },
            "getNewsArticle" => Self::GetNewsArticle {
                article_id: require_str(kind, params, "articleId")?,
            },
            "getRecentNews" => Self::GetRecentNews {
                limit: usize_or(params, "limit", DEFAULT_LIMIT),
            },
            "getSystemStats" => Self::GetSystemStats,
            "getSystemHealth" => Self::GetSystemHealth,
            "getAdminDashboard" => Self::GetAdminDashboard,
            "getSystemMetrics" => Self::GetSystemMetrics,
            "getAuditLog" => Self::GetAuditLog {
                limit: usize_or(params, "limit", DEFAULT_LIMIT),
                offset: usize_or(params, "offset", 0),
            },
            _ => return Err(QueryError::UnknownQueryType(kind.to_string())),
        };
        Ok(query)
    }
}

/// Resolves queries against the injected view bundle.
///
/// Carries a facade handle only for the health and metrics queries; no
/// query ever reads an event stream.
#[derive(Clone, Debug)]
pub struct QueryHandler {
    views: Views,
    store: Arc<EventStore>,
}

impl QueryHandler {
    /// Create a handler over the given views and facade.
    #[must_use]
    pub const fn new(views: Views, store: Arc<EventStore>) -> Self {
        Self { views, store }
    }

    /// The string-keyed dispatch surface: parse then handle.
    ///
    /// # Errors
    ///
    /// Parse errors from [`Query::parse`], plus whatever [`handle`] returns.
    ///
    /// [`handle`]: QueryHandler::handle
    pub async fn handle_query(&self, kind: &str, params: &Value) -> Result<Value, QueryError> {
        let query = Query::parse(kind, params)?;
        self.handle(query).await
    }

    /// Resolve a typed query to a JSON document.
    ///
    /// # Errors
    ///
    /// - [`QueryError::NotFound`] when a point lookup misses
    /// - [`QueryError::View`] when a view backend fails
    #[allow(clippy::too_many_lines)] // One arm per query variant, kept together
    pub async fn handle(&self, query: Query) -> Result<Value, QueryError> {
        match query {
            Query::GetUserProfile { user_id } => self
                .views
                .users
                .get(&user_id)
                .await
                .map_err(view_err("user profile"))?
                .ok_or(QueryError::NotFound {
                    entity: "User",
                    id: user_id,
                }),
            Query::GetUserByEmail { email } => self
                .views
                .users
                .get_by_email(&email)
                .await
                .map_err(view_err("user by email"))?
                .ok_or(QueryError::NotFound {
                    entity: "User",
                    id: email,
                }),
            Query::GetPost { post_id } => self
                .views
                .posts
                .get(&post_id)
                .await
                .map_err(view_err("post"))?
                .ok_or(QueryError::NotFound {
                    entity: "Post",
                    id: post_id,
                }),
            Query::GetPostWithComments { post_id } => self.post_with_comments(&post_id).await,
            Query::ListPosts { limit, offset } => {
                let posts = self
                    .views
                    .posts
                    .list(limit, offset)
                    .await
                    .map_err(view_err("posts"))?;
                Ok(json!({ "posts": posts, "limit": limit, "offset": offset }))
            }
            Query::ListPostsByUser { user_id } => {
                let posts = self
                    .views
                    .posts
                    .by_user(&user_id)
                    .await
                    .map_err(view_err("posts by user"))?;
                Ok(json!({ "userId": user_id, "posts": posts }))
            }
            Query::SearchPosts { query } => {
                let posts = self
                    .views
                    .posts
                    .search(&query)
                    .await
                    .map_err(view_err("post search"))?;
                Ok(json!({ "query": query, "posts": posts }))
            }
            Query::GetTrendingPosts { limit } => {
                let posts = self
                    .views
                    .posts
                    .trending(limit)
                    .await
                    .map_err(view_err("trending posts"))?;
                Ok(json!({ "posts": posts }))
            }
            Query::GetLinkScan { scan_id } => self
                .views
                .link_scans
                .get(&scan_id)
                .await
                .map_err(view_err("link scan"))?
                .ok_or(QueryError::NotFound {
                    entity: "LinkScan",
                    id: scan_id,
                }),
            Query::GetRecentLinkScans { limit } => {
                let scans = self
                    .views
                    .link_scans
                    .recent(limit)
                    .await
                    .map_err(view_err("recent link scans"))?;
                Ok(json!({ "scans": scans }))
            }
            Query::GetConversation { conversation_id } => self
                .views
                .conversations
                .get(&conversation_id)
                .await
                .map_err(view_err("conversation"))?
                .ok_or(QueryError::NotFound {
                    entity: "Conversation",
                    id: conversation_id,
                }),
            Query::GetConversationMessages { conversation_id } => {
                let messages = self
                    .views
                    .messages
                    .for_conversation(&conversation_id)
                    .await
                    .map_err(view_err("conversation messages"))?;
                Ok(json!({ "conversationId": conversation_id, "messages": messages }))
            }
            Query::GetNewsArticle { article_id } => self
                .views
                .news
                .get(&article_id)
                .await
                .map_err(view_err("news article"))?
                .ok_or(QueryError::NotFound {
                    entity: "Article",
                    id: article_id,
                }),
            Query::GetRecentNews { limit } => {
                let articles = self
                    .views
                    .news
                    .recent(limit)
                    .await
                    .map_err(view_err("recent news"))?;
                Ok(json!({ "articles": articles }))
            }
            Query::GetSystemStats => self.system_stats().await,
            Query::GetSystemHealth => Ok(self.system_health().await),
            Query::GetAdminDashboard => self.admin_dashboard().await,
            Query::GetSystemMetrics => {
                let stats = self.store.stats().await;
                let store = serde_json::to_value(&stats).map_err(|e| QueryError::View {
                    context: "system metrics",
                    reason: e.to_string(),
                })?;
                let views = self.system_stats().await?;
                Ok(json!({ "eventStore": store, "views": views }))
            }
            Query::GetAuditLog { limit, offset } => {
                let entries = self
                    .views
                    .audit_log
                    .recent(limit, offset)
                    .await
                    .map_err(view_err("audit log"))?;
                Ok(json!({ "entries": entries, "limit": limit, "offset": offset }))
            }
        }
    }

    /// A post joined with its comments and vote tallies.
    async fn post_with_comments(&self, post_id: &str) -> Result<Value, QueryError> {
        let post = self
            .views
            .posts
            .get(post_id)
            .await
            .map_err(view_err("post"))?
            .ok_or_else(|| QueryError::NotFound {
                entity: "Post",
                id: post_id.to_string(),
            })?;
        let comments = self
            .views
            .comments
            .for_post(post_id)
            .await
            .map_err(view_err("post comments"))?;
        let votes = self
            .views
            .votes
            .for_post(post_id)
            .await
            .map_err(view_err("post votes"))?;

        let up = votes
            .iter()
            .filter(|v| v.get("direction").and_then(Value::as_str) == Some("up"))
            .count();
        let down = votes.len() - up;

        Ok(json!({
            "post": post,
            "comments": comments,
            "votes": { "up": up, "down": down, "total": up + down },
        }))
    }

    /// Entity counts across every view.
    async fn system_stats(&self) -> Result<Value, QueryError> {
        let users = self.views.users.count().await.map_err(view_err("user count"))?;
        let posts = self.views.posts.count().await.map_err(view_err("post count"))?;
        let comments = self
            .views
            .comments
            .count()
            .await
            .map_err(view_err("comment count"))?;
        let scans = self
            .views
            .link_scans
            .count()
            .await
            .map_err(view_err("scan count"))?;
        let conversations = self
            .views
            .conversations
            .count()
            .await
            .map_err(view_err("conversation count"))?;
        let messages = self
            .views
            .messages
            .count()
            .await
            .map_err(view_err("message count"))?;
        let articles = self.views.news.count().await.map_err(view_err("article count"))?;

        Ok(json!({
            "users": users,
            "posts": posts,
            "comments": comments,
            "linkScans": scans,
            "conversations": conversations,
            "messages": messages,
            "newsArticles": articles,
        }))
    }

    /// Per-dependency health. Never errors: a failing dependency is reported
    /// as unhealthy inside the document, not surfaced as a query failure.
    async fn system_health(&self) -> Value {
        let store_health = self.store.health_check().await;
        let views_health = match self.views.users.count().await {
            Ok(_) => json!({ "status": "healthy" }),
            Err(error) => json!({ "status": "unhealthy", "error": error.to_string() }),
        };
        let overall = if store_health.status() == "unhealthy"
            || views_health["status"] == "unhealthy"
        {
            "unhealthy"
        } else {
            "healthy"
        };

        json!({
            "status": overall,
            "eventStore": serde_json::to_value(&store_health).unwrap_or(Value::Null),
            "views": views_health,
        })
    }

    /// Counts, active alerts, top news categories and recent audit entries
    /// for the admin screen.
    async fn admin_dashboard(&self) -> Result<Value, QueryError> {
        let stats = self.system_stats().await?;
        let alerts = self
            .views
            .alerts
            .active()
            .await
            .map_err(view_err("active alerts"))?;
        let alert_count = self
            .views
            .alerts
            .active_count()
            .await
            .map_err(view_err("active alert count"))?;
        let categories = self
            .views
            .news
            .top_categories(DASHBOARD_CATEGORY_LIMIT)
            .await
            .map_err(view_err("top news categories"))?;
        let audit = self
            .views
            .audit_log
            .recent(DEFAULT_LIMIT, 0)
            .await
            .map_err(view_err("audit log"))?;

        Ok(json!({
            "stats": stats,
            "activeAlerts": alerts,
            "activeAlertCount": alert_count,
            "topCategories": categories,
            "recentActions": audit,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::panic)] // Panics: tests fail loudly on broken fixtures
mod tests {
    // Import through the external crate name rather than `super::*`: the
    // dev-dependency cycle with eventline-testing duplicates this crate, and
    // `InMemoryViews::to_views` returns the external copy's `Views`.
    use eventline_handlers::{QueryError, QueryHandler};
    use eventline_store::{EventStore, StoreConfig};
    use eventline_testing::{InMemoryStreamStore, InMemoryViews};
    use serde_json::json;
    use std::sync::Arc;

    fn handler_with_views(views: &Arc<InMemoryViews>) -> QueryHandler {
        let backend = Arc::new(InMemoryStreamStore::new());
        let store = Arc::new(EventStore::new(StoreConfig::default(), backend));
        QueryHandler::new(views.clone().to_views(), store)
    }

    #[tokio::test]
    async fn point_lookup_hits_and_misses() {
        let views = Arc::new(InMemoryViews::new());
        views.insert_user("u1", json!({ "userId": "u1", "email": "a@b.com" }));
        let handler = handler_with_views(&views);

        let user = handler
            .handle_query("getUserProfile", &json!({ "userId": "u1" }))
            .await
            .expect("known user should resolve");
        assert_eq!(user["email"], "a@b.com");

        let missing = handler
            .handle_query("getUserProfile", &json!({ "userId": "nope" }))
            .await;
        assert!(matches!(
            missing,
            Err(QueryError::NotFound { entity: "User", id }) if id == "nope"
        ));
    }

    #[tokio::test]
    async fn unknown_query_type_fails_fast() {
        let views = Arc::new(InMemoryViews::new());
        let handler = handler_with_views(&views);

        let result = handler.handle_query("doesNotExist", &json!({})).await;
        assert!(matches!(result, Err(QueryError::UnknownQueryType(_))));
    }

    #[tokio::test]
    async fn missing_required_param_is_rejected() {
        let views = Arc::new(InMemoryViews::new());
        let handler = handler_with_views(&views);

        let result = handler.handle_query("getPost", &json!({})).await;
        assert!(matches!(
            result,
            Err(QueryError::InvalidParams { kind, .. }) if kind == "getPost"
        ));
    }

    #[tokio::test]
    async fn paging_defaults_apply() {
        let views = Arc::new(InMemoryViews::new());
        let handler = handler_with_views(&views);

        let page = handler
            .handle_query("listPosts", &json!({}))
            .await
            .expect("listPosts should resolve");
        assert_eq!(page["limit"], 20);
        assert_eq!(page["offset"], 0);
    }

    #[tokio::test]
    async fn post_with_comments_joins_and_tallies_votes() {
        let views = Arc::new(InMemoryViews::new());
        views.insert_post("p1", json!({ "postId": "p1", "title": "T" }));
        views.insert_comment("p1", json!({ "commentId": "c1", "content": "hi" }));
        views.insert_vote("p1", json!({ "userId": "u1", "direction": "up" }));
        views.insert_vote("p1", json!({ "userId": "u2", "direction": "up" }));
        views.insert_vote("p1", json!({ "userId": "u3", "direction": "down" }));
        let handler = handler_with_views(&views);

        let doc = handler
            .handle_query("getPostWithComments", &json!({ "postId": "p1" }))
            .await
            .expect("post should resolve");

        assert_eq!(doc["post"]["title"], "T");
        assert_eq!(doc["comments"].as_array().map(Vec::len), Some(1));
        assert_eq!(doc["votes"]["up"], 2);
        assert_eq!(doc["votes"]["down"], 1);
        assert_eq!(doc["votes"]["total"], 3);
    }

    #[tokio::test]
    async fn view_failure_surfaces_context() {
        let views = Arc::new(InMemoryViews::new());
        views.insert_post("p1", json!({ "postId": "p1" }));
        views.set_failing(true);
        let handler = handler_with_views(&views);

        let result = handler
            .handle_query("getPost", &json!({ "postId": "p1" }))
            .await;
        match result {
            Err(QueryError::View { context, .. }) => assert_eq!(context, "post"),
            other => panic!("expected view error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn system_stats_count_every_view() {
        let views = Arc::new(InMemoryViews::new());
        views.insert_user("u1", json!({}));
        views.insert_post("p1", json!({}));
        views.insert_post("p2", json!({}));
        views.insert_news("n1", json!({}));
        let handler = handler_with_views(&views);

        let stats = handler
            .handle_query("getSystemStats", &json!({}))
            .await
            .expect("stats should resolve");
        assert_eq!(stats["users"], 1);
        assert_eq!(stats["posts"], 2);
        assert_eq!(stats["newsArticles"], 1);
        assert_eq!(stats["comments"], 0);
    }

    #[tokio::test]
    async fn system_health_never_errors() {
        let views = Arc::new(InMemoryViews::new());
        views.set_failing(true);
        let handler = handler_with_views(&views);

        let health = handler
            .handle_query("getSystemHealth", &json!({}))
            .await
            .expect("health query must not fail");
        assert_eq!(health["status"], "unhealthy");
        assert_eq!(health["views"]["status"], "unhealthy");
        assert!(health["eventStore"]["status"].is_string());
    }

    #[tokio::test]
    async fn admin_dashboard_aggregates() {
        let views = Arc::new(InMemoryViews::new());
        views.insert_alert("a1", json!({ "alertId": "a1", "severity": "critical" }));
        views.insert_audit("x1", json!({ "actionId": "x1", "action": "ban" }));
        views.insert_news("n1", json!({ "category": "tech" }));
        views.insert_news("n2", json!({ "category": "tech" }));
        views.insert_news("n3", json!({ "category": "science" }));
        let handler = handler_with_views(&views);

        let dashboard = handler
            .handle_query("getAdminDashboard", &json!({}))
            .await
            .expect("dashboard should resolve");
        assert_eq!(dashboard["activeAlerts"].as_array().map(Vec::len), Some(1));
        assert_eq!(dashboard["activeAlertCount"], 1);
        assert_eq!(dashboard["recentActions"].as_array().map(Vec::len), Some(1));
        assert!(dashboard["stats"]["users"].is_number());
        assert_eq!(dashboard["topCategories"][0]["category"], "tech");
        assert_eq!(dashboard["topCategories"][0]["count"], 2);
        assert_eq!(dashboard["topCategories"][1]["category"], "science");
    }

    #[tokio::test]
    async fn system_metrics_echo_store_stats() {
        let views = Arc::new(InMemoryViews::new());
        let handler = handler_with_views(&views);

        let metrics = handler
            .handle_query("getSystemMetrics", &json!({}))
            .await
            .expect("metrics should resolve");
        assert_eq!(metrics["eventStore"]["eventsAppended"], 0);
        assert!(metrics["eventStore"]["config"]["batchSize"].is_number());
        assert_eq!(metrics["views"]["users"], 0);
    }
}
