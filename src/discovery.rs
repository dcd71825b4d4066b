//! Token discovery: which minted tokens are posts of this application.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::codec::token_to_content_id;
use crate::error::FeedError;
use crate::models::{Discovered, Principal, SortOrder, TokenId, APP_TAG_NAME};
use crate::ownership::resolve_owners;
use crate::registry::Registry;
use crate::storage::{Tag, TagIndex};

#[derive(Debug, Clone)]
pub struct DiscoveryParams<'a> {
    pub app_name: &'a str,
    pub owner: Option<&'a Principal>,
    pub sort: SortOrder,
    pub batch_size: u64,
}

/// Enumerates `[0, supply)` in `batch_size` chunks. `supply` is whatever the
/// registry claims, so nothing is sized from it up front; a short chunk ends
/// the walk.
async fn enumerate(registry: &dyn Registry, supply: u64, batch_size: u64) -> Result<Vec<TokenId>, FeedError> {
    let batch = batch_size.max(1);
    let mut out = Vec::new();
    let mut start = 0u64;
    while start < supply {
        let count = batch.min(supply - start);
        let chunk = registry.list_tokens(start, count).await?;
        if chunk.is_empty() {
            break;
        }
        start += chunk.len() as u64;
        out.extend(chunk);
    }
    Ok(out)
}

/// Produces the feed's ordered content ids.
///
/// Registry failures are fatal. A failing tag index degrades to an empty match
/// set so discovery still answers (with nothing).
pub async fn discover(
    registry: &dyn Registry,
    index: &dyn TagIndex,
    params: DiscoveryParams<'_>,
) -> Result<Vec<Discovered>, FeedError> {
    let supply = registry.total_supply().await?;
    if supply == 0 {
        debug!("registry empty");
        return Ok(Vec::new());
    }

    let mut tokens = enumerate(registry, supply, params.batch_size).await?;
    tokens.sort_unstable();
    tokens.dedup();
    let minted: Vec<Discovered> = tokens
        .into_iter()
        .map(|token_id| Discovered { token_id, content_id: token_to_content_id(token_id) })
        .collect();
    if minted.is_empty() {
        debug!(supply, "registry listed no tokens");
        return Ok(Vec::new());
    }

    let ids: Vec<String> = minted.iter().map(|d| d.content_id.clone()).collect();
    let tag = Tag::new(APP_TAG_NAME, params.app_name);
    let matches: HashSet<String> = match index.matching(&ids, &tag).await {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "tag index unavailable, treating match set as empty");
            metrics::increment_counter!("feed_tag_query_degraded_total");
            HashSet::new()
        }
    };

    let mut found: Vec<Discovered> = minted.into_iter().filter(|d| matches.contains(&d.content_id)).collect();

    if let Some(owner) = params.owner {
        let token_ids: Vec<TokenId> = found.iter().map(|d| d.token_id).collect();
        let owners = resolve_owners(registry, &token_ids).await?;
        found = found
            .into_iter()
            .zip(owners)
            .filter(|(_, o)| o.as_ref() == Some(owner))
            .map(|(d, _)| d)
            .collect();
    }

    // mint order == ascending token id; newest first is the reverse
    if params.sort == SortOrder::Newest {
        found.reverse();
    }
    info!(supply, discovered = found.len(), "discovery complete");
    Ok(found)
}
