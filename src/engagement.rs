//! Engagement overlay for posts: counters, the caller's own reaction, and the
//! impression/view side effect.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{BackendResult, EngagementBackend, ReactionCounts};
use crate::models::{Engagement, Principal, ReactionKind};

/// Where a post is being shown; decides which telemetry call fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewContext {
    /// Post listed in a feed: records an impression.
    List,
    /// Single post page: records a view.
    Single,
}

fn or_zero<T: Default>(metric: &'static str, id: &str, r: BackendResult<T>) -> T {
    r.unwrap_or_else(|e| {
        warn!(post = id, metric, error = %e, "engagement metric unavailable");
        metrics::increment_counter!("feed_engagement_degraded_total", "metric" => metric);
        T::default()
    })
}

/// Fire-and-forget telemetry; never awaited, failures only reach the debug log.
pub fn record_seen(backend: Arc<dyn EngagementBackend>, id: String, ctx: ViewContext) {
    tokio::spawn(async move {
        let res = match ctx {
            ViewContext::List => backend.record_impression(&id).await,
            ViewContext::Single => backend.record_view(&id).await,
        };
        if let Err(e) = res {
            debug!(post = %id, ?ctx, error = %e, "telemetry call failed");
        }
    });
}

/// Fetches counters (and the caller's reaction when signed in) for one post.
/// Each metric degrades to zero on its own.
pub async fn fetch_engagement(
    backend: &Arc<dyn EngagementBackend>,
    id: &str,
    caller: Option<&Principal>,
    ctx: ViewContext,
) -> Engagement {
    record_seen(backend.clone(), id.to_string(), ctx);

    let user_reaction = async {
        match caller {
            Some(p) => or_zero("user_reaction", id, backend.get_user_reaction(id, p).await),
            None => None,
        }
    };
    let (counts, views, impressions, mine) = tokio::join!(
        backend.get_reaction_counts(id),
        backend.get_view_count(id),
        backend.get_impressions(id),
        user_reaction,
    );
    let counts: ReactionCounts = or_zero("reaction_counts", id, counts);

    Engagement {
        likes: counts.likes,
        dislikes: counts.dislikes,
        comments: counts.total_comments,
        views: or_zero("views", id, views),
        impressions: or_zero("impressions", id, impressions),
        user_liked: mine == Some(ReactionKind::Like),
        user_disliked: mine == Some(ReactionKind::Dislike),
    }
}
