use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::feed::{FeedConfig, FeedDeps, FeedEngine, FeedScope, FeedSnapshot, LoadOutcome};
use crate::models::{Engagement, Principal, ReactionKind, SortOrder};
use crate::rate_limit::RateLimiterFacade;
use crate::reaction::ReactionPhase;
use crate::sessions::FeedSessions;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/feeds").route(web::post().to(create_feed)))
            .service(
                web::resource("/feeds/{id}")
                    .route(web::get().to(get_feed))
                    .route(web::delete().to(delete_feed)),
            )
            .service(web::resource("/feeds/{id}/more").route(web::post().to(load_more)))
            .service(web::resource("/feeds/{id}/sort").route(web::post().to(sort_feed)))
            .service(web::resource("/feeds/{id}/owner").route(web::post().to(owner_feed)))
            .service(web::resource("/feeds/{id}/refresh").route(web::post().to(refresh_feed)))
            .service(
                web::resource("/feeds/{id}/posts/{content_id}/reaction")
                    .route(web::post().to(react)),
            )
            .service(web::resource("/posts/{content_id}").route(web::get().to(get_post))),
    );
    cfg.route("/metrics", web::get().to(metrics_endpoint));
}

/// Idle time after which an abandoned feed session is dropped.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
pub struct AppState {
    pub deps: FeedDeps,
    pub feed_config: FeedConfig,
    pub feeds: FeedSessions,
    pub rate_limiter: Option<RateLimiterFacade>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(deps: FeedDeps, feed_config: FeedConfig) -> Self {
        Self { deps, feed_config, feeds: FeedSessions::new(DEFAULT_SESSION_TTL), rate_limiter: None, metrics: None }
    }

    fn engine(&self, id: &Uuid) -> Result<Arc<FeedEngine>, ApiError> {
        self.feeds.get(id).ok_or(ApiError::NotFound)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateFeedRequest {
    #[serde(default)]
    pub sort: SortOrder,
    /// Only posts currently owned by this principal.
    pub owner: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateFeedResponse {
    pub feed_id: Uuid,
    pub snapshot: FeedSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoadMoreResponse {
    pub outcome: LoadOutcome,
    pub snapshot: FeedSnapshot,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SortRequest {
    pub sort: SortOrder,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OwnerRequest {
    /// `null` returns to the global feed.
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReactionRequest {
    pub kind: ReactionKind,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReactionResponse {
    pub engagement: Engagement,
    pub phase: ReactionPhase,
}

/// Caller for endpoints open to anonymous viewers. A bearer token that is sent
/// but does not validate is refused rather than read as anonymous.
fn optional_caller(req: &HttpRequest, auth: Option<Auth>) -> Result<Option<Principal>, ApiError> {
    match auth {
        Some(a) => Ok(Some(a.principal())),
        None if req.headers().contains_key(header::AUTHORIZATION) => Err(ApiError::Unauthorized),
        None => Ok(None),
    }
}

fn client_key(req: &HttpRequest) -> String {
    req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string()
}

#[utoipa::path(
    post,
    path = "/api/v1/feeds",
    request_body = CreateFeedRequest,
    responses(
        (status = 201, description = "Feed opened; a failed discovery shows up as state=failed", body = CreateFeedResponse),
        (status = 401, description = "Bearer token sent but invalid or expired"),
        (status = 429, description = "Too many feeds opened")
    )
)]
pub async fn create_feed(
    req: HttpRequest,
    auth: Option<Auth>,
    data: web::Data<AppState>,
    payload: web::Json<CreateFeedRequest>,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_feed(&client_key(&req)) { return Err(ApiError::TooManyRequests); }
    }
    let body = payload.into_inner();
    let scope = match body.owner.filter(|o| !o.is_empty()) {
        Some(owner) => FeedScope::Owner(Principal(owner)),
        None => FeedScope::All,
    };
    let caller = optional_caller(&req, auth)?;
    let engine = Arc::new(FeedEngine::new(data.deps.clone(), data.feed_config.clone(), scope, body.sort, caller));
    let feed_id = Uuid::new_v4();
    data.feeds.insert(feed_id, engine.clone());
    info!(%feed_id, "feed opened");

    // errors are reported through the snapshot state so the client can retry
    let snapshot = engine.refresh().await.unwrap_or_else(|_| engine.snapshot());
    Ok(HttpResponse::Created().json(CreateFeedResponse { feed_id, snapshot }))
}

#[utoipa::path(
    get,
    path = "/api/v1/feeds/{id}",
    params(("id" = Uuid, Path, description = "Feed id")),
    responses(
        (status = 200, description = "Current feed state", body = FeedSnapshot),
        (status = 404, description = "Unknown feed")
    )
)]
pub async fn get_feed(data: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, ApiError> {
    let engine = data.engine(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(engine.snapshot()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/feeds/{id}",
    params(("id" = Uuid, Path, description = "Feed id")),
    responses(
        (status = 204, description = "Feed closed"),
        (status = 404, description = "Unknown or expired feed")
    )
)]
pub async fn delete_feed(data: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, ApiError> {
    // in-flight fetches finish against the detached engine and are dropped with it
    if !data.feeds.remove(&path.into_inner()) {
        return Err(ApiError::NotFound);
    }
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/feeds/{id}/more",
    params(("id" = Uuid, Path, description = "Feed id")),
    responses(
        (status = 200, description = "Next page appended (or ignored)", body = LoadMoreResponse),
        (status = 404, description = "Unknown feed"),
        (status = 502, description = "Registry failure; retry via refresh")
    )
)]
pub async fn load_more(data: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, ApiError> {
    let engine = data.engine(&path.into_inner())?;
    let outcome = engine.load_more().await?;
    Ok(HttpResponse::Ok().json(LoadMoreResponse { outcome, snapshot: engine.snapshot() }))
}

#[utoipa::path(
    post,
    path = "/api/v1/feeds/{id}/sort",
    request_body = SortRequest,
    params(("id" = Uuid, Path, description = "Feed id")),
    responses(
        (status = 200, description = "Feed restarted in the new order", body = FeedSnapshot),
        (status = 404, description = "Unknown feed"),
        (status = 502, description = "Discovery failed")
    )
)]
pub async fn sort_feed(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<SortRequest>,
) -> Result<HttpResponse, ApiError> {
    let engine = data.engine(&path.into_inner())?;
    let snapshot = engine.set_sort(payload.sort).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

#[utoipa::path(
    post,
    path = "/api/v1/feeds/{id}/owner",
    request_body = OwnerRequest,
    params(("id" = Uuid, Path, description = "Feed id")),
    responses(
        (status = 200, description = "Feed restarted with the new owner filter", body = FeedSnapshot),
        (status = 404, description = "Unknown feed"),
        (status = 502, description = "Discovery failed")
    )
)]
pub async fn owner_feed(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<OwnerRequest>,
) -> Result<HttpResponse, ApiError> {
    let engine = data.engine(&path.into_inner())?;
    let owner = payload.into_inner().owner.filter(|o| !o.is_empty()).map(Principal);
    let snapshot = engine.set_owner(owner).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

#[utoipa::path(
    post,
    path = "/api/v1/feeds/{id}/refresh",
    params(("id" = Uuid, Path, description = "Feed id")),
    responses(
        (status = 200, description = "Feed rediscovered from scratch", body = FeedSnapshot),
        (status = 404, description = "Unknown feed"),
        (status = 502, description = "Discovery failed")
    )
)]
pub async fn refresh_feed(data: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, ApiError> {
    let engine = data.engine(&path.into_inner())?;
    let snapshot = engine.refresh().await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

#[utoipa::path(
    post,
    path = "/api/v1/feeds/{id}/posts/{content_id}/reaction",
    request_body = ReactionRequest,
    params(
        ("id" = Uuid, Path, description = "Feed id"),
        ("content_id" = String, Path, description = "Post content id")
    ),
    responses(
        (status = 200, description = "Reaction confirmed", body = ReactionResponse),
        (status = 401, description = "Not signed in, or not the feed's viewer"),
        (status = 404, description = "Unknown feed or post"),
        (status = 409, description = "Reaction already pending"),
        (status = 429, description = "Too many reactions"),
        (status = 502, description = "Backend rejected; local state rolled back")
    )
)]
pub async fn react(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
    payload: web::Json<ReactionRequest>,
) -> Result<HttpResponse, ApiError> {
    let (feed_id, content_id) = path.into_inner();
    let principal = auth.principal();
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_reaction(principal.as_str()) { return Err(ApiError::TooManyRequests); }
    }
    let engine = data.engine(&feed_id)?;
    if engine.caller() != Some(&principal) {
        return Err(ApiError::Unauthorized);
    }
    let engagement = engine.react(&content_id, payload.kind).await?;
    let phase = engine.reaction_phase(&content_id);
    Ok(HttpResponse::Ok().json(ReactionResponse { engagement, phase }))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/{content_id}",
    params(("content_id" = String, Path, description = "Post content id")),
    responses(
        (status = 200, description = "Single post; records a view", body = crate::models::Post),
        (status = 400, description = "Malformed content id"),
        (status = 401, description = "Bearer token sent but invalid or expired"),
        (status = 404, description = "Content unavailable")
    )
)]
pub async fn get_post(
    req: HttpRequest,
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = optional_caller(&req, auth)?;
    let scope = FeedScope::Single(path.into_inner());
    let engine = FeedEngine::new(data.deps.clone(), data.feed_config.clone(), scope, SortOrder::default(), caller);
    let snapshot = engine.refresh().await?;
    let post = snapshot.posts.into_iter().next().ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn metrics_endpoint(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let handle = data.metrics.as_ref().ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render()))
}
