use crate::feed::{FeedSnapshot, LoadOutcome};
use crate::models::{Engagement, MediaRef, Post, Principal, ReactionKind, SortOrder};
use crate::paginator::FeedState;
use crate::reaction::ReactionPhase;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::create_feed,
        crate::routes::get_feed,
        crate::routes::delete_feed,
        crate::routes::load_more,
        crate::routes::sort_feed,
        crate::routes::owner_feed,
        crate::routes::refresh_feed,
        crate::routes::react,
        crate::routes::get_post,
    ),
    components(schemas(
        Post, Engagement, MediaRef, Principal, ReactionKind, SortOrder,
        FeedState, FeedSnapshot, LoadOutcome, ReactionPhase,
        crate::routes::CreateFeedRequest, crate::routes::CreateFeedResponse,
        crate::routes::LoadMoreResponse, crate::routes::SortRequest,
        crate::routes::OwnerRequest, crate::routes::ReactionRequest,
        crate::routes::ReactionResponse,
    )),
    tags(
        (name = "feeds", description = "Paginated post feeds"),
        (name = "posts", description = "Single posts and reactions"),
    )
)]
pub struct ApiDoc;
