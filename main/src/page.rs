//! Data behind the home and stream pages, independent of HTTP and HTML.

use crate::catalog::CatalogSnapshot;
use crate::service::Category;
use serde::Deserialize;
use thiserror::Error;

/// Separates the display name from the stream prefix in a publisher's `info`.
const INFO_DELIMITER: char = '_';

/// Display name and stream prefix announced by a publisher.
#[derive(Debug, PartialEq, Eq)]
pub struct PublisherInfo<'a> {
    pub name: &'a str,
    pub prefix: &'a str,
}

impl<'a> PublisherInfo<'a> {
    pub fn parse(info: &'a str) -> Result<Self, PublisherInfoError> {
        let mut parts = info.split(INFO_DELIMITER);
        match (parts.next(), parts.next()) {
            (Some(name), Some(prefix)) => Ok(Self { name, prefix }),
            _ => Err(PublisherInfoError(info.into())),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Malformed stream publisher info: {0:?}")]
pub struct PublisherInfoError(String);

/// One origin/cache pairing offered on the home page.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StreamOption {
    pub origin: String,
    pub origin_name: String,
    pub prefix: String,
    pub cache: String,
    pub cache_name: String,
}

impl StreamOption {
    /// Every way of playing this pairing: each player pointed at either end.
    pub fn links(&self) -> [StreamRequest; 4] {
        let request = |target, player| StreamRequest {
            target,
            prefix: self.prefix.clone(),
            player,
        };
        [
            request(Target::Origin(self.origin.clone()), Player::Legacy),
            request(Target::Cache(self.cache.clone()), Player::Legacy),
            request(Target::Origin(self.origin.clone()), Player::Current),
            request(Target::Cache(self.cache.clone()), Player::Current),
        ]
    }
}

/// Cross product of every well-formed publisher with every cache.
///
/// Publishers whose `info` cannot be parsed are skipped.
pub fn stream_options(snapshot: &CatalogSnapshot) -> Vec<StreamOption> {
    let caches = snapshot.get(Category::ProxyCache);
    let mut options = Vec::new();
    for publisher in snapshot.get(Category::StreamPublisher) {
        let info = match PublisherInfo::parse(&publisher.info) {
            Ok(info) => info,
            Err(e) => {
                log::warn!("Skipping publisher {}: {}", publisher.host(), e);
                continue;
            }
        };
        options.extend(caches.iter().map(|cache| StreamOption {
            origin: publisher.host(),
            origin_name: info.name.into(),
            prefix: info.prefix.into(),
            cache: cache.host(),
            cache_name: cache.info.clone(),
        }));
    }
    options
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Target {
    Origin(String),
    Cache(String),
}

impl Target {
    pub fn address(&self) -> &str {
        match self {
            Target::Origin(address) | Target::Cache(address) => address,
        }
    }

    fn query_key(&self) -> &'static str {
        match self {
            Target::Origin(_) => "origin",
            Target::Cache(_) => "cache",
        }
    }
}

/// Video player embedded in the stream page.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Player {
    Legacy,
    Current,
}

impl Player {
    fn is_legacy(self) -> bool {
        self == Player::Legacy
    }
}

/// Raw query parameters of the stream page.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    pub origin: Option<String>,
    pub cache: Option<String>,
    pub prefix: Option<String>,
    pub old: Option<String>,
}

/// Validated stream page request.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StreamRequest {
    pub target: Target,
    pub prefix: String,
    pub player: Player,
}

impl StreamRequest {
    pub fn manifest_url(&self) -> String {
        format!("//{}/{}_playlist.m3u8", self.target.address(), self.prefix)
    }

    /// Relative URL of the stream page for this request, with a form-encoded query.
    pub fn href(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("prefix", &self.prefix)
            .append_pair(self.target.query_key(), self.target.address())
            .append_pair("old", if self.player.is_legacy() { "true" } else { "false" })
            .finish();
        format!("/stream?{}", query)
    }
}

impl TryFrom<StreamParams> for StreamRequest {
    type Error = StreamParamError;

    fn try_from(params: StreamParams) -> Result<Self, Self::Error> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        let target = match (non_empty(params.cache), non_empty(params.origin)) {
            (Some(cache), _) => Target::Cache(cache),
            (None, Some(origin)) => Target::Origin(origin),
            (None, None) => return Err(StreamParamError::MissingTarget),
        };
        let prefix = non_empty(params.prefix).ok_or(StreamParamError::MissingPrefix)?;
        let player = match params.old.as_deref() {
            None | Some("false") => Player::Current,
            Some("true") => Player::Legacy,
            Some(other) => return Err(StreamParamError::InvalidOld(other.into())),
        };
        Ok(Self {
            target,
            prefix,
            player,
        })
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StreamParamError {
    #[error("neither cache nor origin query param is set")]
    MissingTarget,

    #[error("prefix query param is not set")]
    MissingPrefix,

    #[error("old query param is {0:?}, expected true or false")]
    InvalidOld(String),
}
