use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// Tag name the composer writes and discovery filters on.
pub const APP_TAG_NAME: &str = "Application-Name";
pub const PAYLOAD_VERSION: &str = "1.0";

/// Sequential token id assigned at mint time. Serialised as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenId(pub u128);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct TokenIdVisitor;
        impl<'de> de::Visitor<'de> for TokenIdVisitor {
            type Value = TokenId;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a token id as decimal string or unsigned integer")
            }
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<TokenId, E> {
                Ok(TokenId(v as u128))
            }
            fn visit_u128<E: de::Error>(self, v: u128) -> Result<TokenId, E> {
                Ok(TokenId(v))
            }
            fn visit_str<E: de::Error>(self, v: &str) -> Result<TokenId, E> {
                v.parse::<u128>().map(TokenId).map_err(E::custom)
            }
        }
        d.deserialize_any(TokenIdVisitor)
    }
}

/// Account / owner identifier as issued by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Principal(pub String);

impl Principal {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ReactionKind {
    Like,
    Dislike,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MediaRef {
    pub content_id: String,
    pub mime_type: String,
    pub filename: Option<String>,
}

/// Backend-owned counters plus the viewing user's own reaction flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct Engagement {
    pub likes: u64,
    pub dislikes: u64,
    pub comments: u64,
    pub views: u64,
    pub impressions: u64,
    pub user_liked: bool,
    pub user_disliked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Post {
    pub identifier: String,
    #[schema(value_type = String)]
    pub token_id: TokenId,
    pub author: Option<Principal>, // current owner, not original creator
    pub created_at: i64,           // ms epoch, client supplied
    pub content: Option<String>,
    pub media: Option<MediaRef>,
    pub engagement: Engagement,
}

/// Decoded content object, before ownership and engagement are overlaid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostBody {
    pub content: Option<String>,
    pub created_at: i64,
    pub media: Option<MediaRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMeta {
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

/// Content object wire format written by the composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPayload {
    pub content: String,
    pub created_at: i64,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_arweave_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_filename: Option<String>,
}

impl PostPayload {
    pub fn new(content: impl Into<String>, created_at: i64) -> Self {
        Self {
            content: content.into(),
            created_at,
            version: PAYLOAD_VERSION.to_string(),
            media_arweave_id: None,
            media_type: None,
            media_filename: None,
        }
    }

    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media_arweave_id = Some(media.content_id);
        self.media_type = Some(media.mime_type);
        self.media_filename = media.filename;
        self
    }

    /// Tags the composer attaches on upload; discovery filters on the app tag.
    pub fn upload_tags(&self, app_name: &str) -> Vec<(String, String)> {
        vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (APP_TAG_NAME.to_string(), app_name.to_string()),
            ("Version".to_string(), self.version.clone()),
        ]
    }
}

/// Token discovered for a feed, in final feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub token_id: TokenId,
    pub content_id: String,
}
