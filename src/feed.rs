//! Feed engine: one instance per mounted feed view (main feed, a profile's
//! posts, or a single post page).

use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::backend::EngagementBackend;
use crate::codec::content_id_to_token;
use crate::content::fetch_post_body;
use crate::discovery::{discover, DiscoveryParams};
use crate::engagement::{fetch_engagement, ViewContext};
use crate::error::FeedError;
use crate::models::{Discovered, Engagement, Post, Principal, ReactionKind, SortOrder, TokenId};
use crate::ownership::resolve_owners;
use crate::paginator::{FeedState, Paginator};
use crate::reaction::{ReactionPhase, ReactionTracker};
use crate::registry::Registry;
use crate::storage::{ContentStore, TagIndex};

/// External collaborators shared by every feed instance.
#[derive(Clone)]
pub struct FeedDeps {
    pub registry: Arc<dyn Registry>,
    pub index: Arc<dyn TagIndex>,
    pub store: Arc<dyn ContentStore>,
    pub backend: Arc<dyn EngagementBackend>,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub app_name: String,
    pub page_size: usize,
    pub registry_batch_size: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { app_name: "Dialectica".into(), page_size: 10, registry_batch_size: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    All,
    Owner(Principal),
    /// Feed of one: a single post page.
    Single(String),
}

impl FeedScope {
    fn view_context(&self) -> ViewContext {
        match self {
            FeedScope::Single(_) => ViewContext::Single,
            _ => ViewContext::List,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FeedSnapshot {
    pub state: FeedState,
    pub sort: SortOrder,
    pub posts: Vec<Post>,
    /// Number of discovered posts, loaded or not.
    pub total: usize,
    pub has_more: bool,
    pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    Appended { count: usize },
    /// A page was already in flight or nothing is left.
    Ignored,
    /// The feed was restarted while this page was loading.
    Stale,
}

struct Inner {
    paginator: Paginator<Post>,
    reactions: ReactionTracker,
    sort: SortOrder,
    scope: FeedScope,
}

pub struct FeedEngine {
    deps: FeedDeps,
    config: FeedConfig,
    caller: Option<Principal>,
    inner: Mutex<Inner>,
}

impl FeedEngine {
    pub fn new(deps: FeedDeps, config: FeedConfig, scope: FeedScope, sort: SortOrder, caller: Option<Principal>) -> Self {
        let paginator = Paginator::new(config.page_size);
        Self {
            deps,
            config,
            caller,
            inner: Mutex::new(Inner { paginator, reactions: ReactionTracker::default(), sort, scope }),
        }
    }

    // never held across an await
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn caller(&self) -> Option<&Principal> {
        self.caller.as_ref()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let g = self.lock();
        FeedSnapshot {
            state: g.paginator.state().clone(),
            sort: g.sort,
            posts: g.paginator.items().to_vec(),
            total: g.paginator.discovered().len(),
            has_more: g.paginator.has_more(),
            loading: g.paginator.is_loading(),
        }
    }

    pub fn reaction_phase(&self, id: &str) -> ReactionPhase {
        self.lock().reactions.phase(id)
    }

    /// Restarts discovery from scratch and loads the first page. Also the
    /// retry path after a failure.
    pub async fn refresh(&self) -> Result<FeedSnapshot, FeedError> {
        let (generation, sort, scope) = {
            let mut g = self.lock();
            g.reactions.clear();
            (g.paginator.begin_discovery(), g.sort, g.scope.clone())
        };

        let discovered = match self.discover(&scope, sort).await {
            Ok(d) => d,
            Err(e) => {
                if self.lock().paginator.fail(generation, e.to_string()) {
                    warn!(error = %e, "feed discovery failed");
                    return Err(e);
                }
                return Ok(self.snapshot());
            }
        };

        if !self.lock().paginator.finish_discovery(generation, discovered) {
            debug!(generation, "discarding superseded discovery");
            metrics::increment_counter!("feed_stale_results_total");
            return Ok(self.snapshot());
        }
        self.load_more().await?;
        Ok(self.snapshot())
    }

    /// Re-sorting always restarts discovery; pages are never resorted in place.
    pub async fn set_sort(&self, sort: SortOrder) -> Result<FeedSnapshot, FeedError> {
        self.lock().sort = sort;
        self.refresh().await
    }

    /// Switches between the global feed and one owner's posts.
    pub async fn set_owner(&self, owner: Option<Principal>) -> Result<FeedSnapshot, FeedError> {
        self.lock().scope = match owner {
            Some(p) => FeedScope::Owner(p),
            None => FeedScope::All,
        };
        self.refresh().await
    }

    /// Loads the next page. A call made while another page is in flight, or
    /// after the feed is exhausted, does nothing.
    pub async fn load_more(&self) -> Result<LoadOutcome, FeedError> {
        let (ticket, ids, ctx) = {
            let mut g = self.lock();
            let Some(ticket) = g.paginator.begin_page() else {
                return Ok(LoadOutcome::Ignored);
            };
            let ids = g.paginator.page_ids(&ticket).to_vec();
            (ticket, ids, g.scope.view_context())
        };
        let generation = ticket.generation();

        match self.fetch_page(&ids, ctx).await {
            Ok(posts) => {
                let count = posts.len();
                if self.lock().paginator.complete_page(ticket, posts) {
                    debug!(count, requested = ids.len(), "page appended");
                    Ok(LoadOutcome::Appended { count })
                } else {
                    metrics::increment_counter!("feed_stale_results_total");
                    Ok(LoadOutcome::Stale)
                }
            }
            Err(e) => {
                if self.lock().paginator.fail(generation, e.to_string()) {
                    warn!(error = %e, "page fetch failed");
                    Err(e)
                } else {
                    Ok(LoadOutcome::Stale)
                }
            }
        }
    }

    /// Reacts as the viewing user. The optimistic state is visible at once and
    /// rolled back if the backend rejects the reaction.
    pub async fn react(&self, id: &str, kind: ReactionKind) -> Result<Engagement, FeedError> {
        let caller = self.caller.as_ref().ok_or(FeedError::Unauthenticated)?;
        let (generation, optimistic) = {
            let mut g = self.lock();
            let inner = &mut *g;
            let post = inner
                .paginator
                .items_mut()
                .iter_mut()
                .find(|p| p.identifier == id)
                .ok_or(FeedError::PostNotFound)?;
            let next = inner
                .reactions
                .submit(id, post.engagement, kind)
                .map_err(|_| FeedError::ReactionPending)?;
            post.engagement = next;
            (inner.paginator.generation(), next)
        };

        match self.deps.backend.add_reaction(id, kind, caller).await {
            Ok(()) => {
                let mut g = self.lock();
                if g.paginator.generation() == generation {
                    g.reactions.confirm(id);
                }
                info!(post = id, ?kind, "reaction confirmed");
                Ok(optimistic)
            }
            Err(e) => {
                warn!(post = id, ?kind, error = %e, "reaction rejected, rolling back");
                metrics::increment_counter!("feed_reaction_rollbacks_total");
                let mut g = self.lock();
                let inner = &mut *g;
                if inner.paginator.generation() == generation {
                    if let Some(previous) = inner.reactions.rollback(id) {
                        if let Some(post) = inner.paginator.items_mut().iter_mut().find(|p| p.identifier == id) {
                            post.engagement = previous;
                        }
                    }
                }
                Err(FeedError::ReactionRejected(e.to_string()))
            }
        }
    }

    async fn discover(&self, scope: &FeedScope, sort: SortOrder) -> Result<Vec<Discovered>, FeedError> {
        let owner = match scope {
            FeedScope::Single(id) => {
                let token_id = content_id_to_token(id)?;
                return Ok(vec![Discovered { token_id, content_id: id.clone() }]);
            }
            FeedScope::Owner(p) => Some(p),
            FeedScope::All => None,
        };
        let params = DiscoveryParams {
            app_name: &self.config.app_name,
            owner,
            sort,
            batch_size: self.config.registry_batch_size,
        };
        discover(self.deps.registry.as_ref(), self.deps.index.as_ref(), params).await
    }

    /// Owners are fatal for the page; content failures drop single posts;
    /// engagement degrades per metric. Posts come back in `ids` order.
    async fn fetch_page(&self, ids: &[Discovered], ctx: ViewContext) -> Result<Vec<Post>, FeedError> {
        let token_ids: Vec<TokenId> = ids.iter().map(|d| d.token_id).collect();
        let owners = resolve_owners(self.deps.registry.as_ref(), &token_ids).await?;
        let caller = self.caller.as_ref();

        let posts = ids.iter().zip(owners).map(|(d, author)| async move {
            let body = match fetch_post_body(self.deps.store.as_ref(), &d.content_id).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(post = %d.content_id, error = %e, "dropping post, content unavailable");
                    metrics::increment_counter!("feed_post_dropped_total");
                    return None;
                }
            };
            let engagement = fetch_engagement(&self.deps.backend, &d.content_id, caller, ctx).await;
            Some(Post {
                identifier: d.content_id.clone(),
                token_id: d.token_id,
                author,
                created_at: body.created_at,
                content: body.content,
                media: body.media,
                engagement,
            })
        });
        Ok(join_all(posts).await.into_iter().flatten().collect())
    }
}
