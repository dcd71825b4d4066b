use crate::error::FeedError;
use crate::models::{Principal, TokenId};
use crate::registry::Registry;

/// Batch-resolves the current owner of each token, parallel to `tokens`.
///
/// One registry call, no per-item fallback: any failure fails the batch.
pub async fn resolve_owners(
    registry: &dyn Registry,
    tokens: &[TokenId],
) -> Result<Vec<Option<Principal>>, FeedError> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let owners = registry.resolve_owners(tokens).await?;
    if owners.len() != tokens.len() {
        return Err(FeedError::OwnerMismatch { expected: tokens.len(), got: owners.len() });
    }
    Ok(owners)
}
