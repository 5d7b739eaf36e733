use crate::fetcher::FetchError;

/// Why a pool or an image produced no metrics.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectError {
    /// The `rbd` invocation failed.
    Fetch(FetchError),
    /// Output was not valid JSON of the expected layout.
    Decode { what: &'static str, message: String },
    /// The image declares `mode` but lacks the matching status object.
    MissingStatus { mode: &'static str, field: &'static str },
    /// Peer-description layout without any peer site.
    NoPeerSite,
    /// Peer description without an embedded `{...}` stats fragment.
    NoStatsFragment,
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Fetch(e) => write!(f, "{}", e),
            CollectError::Decode { what, message } => write!(f, "decode {}: {}", what, message),
            CollectError::MissingStatus { mode, field } => {
                write!(f, "mode {} without {}", mode, field)
            }
            CollectError::NoPeerSite => write!(f, "no peer sites"),
            CollectError::NoStatsFragment => write!(f, "peer description has no stats"),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Fetch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FetchError> for CollectError {
    fn from(e: FetchError) -> Self {
        CollectError::Fetch(e)
    }
}

impl CollectError {
    pub(crate) fn decode(what: &'static str, e: serde_json::Error) -> Self {
        CollectError::Decode {
            what,
            message: e.to_string(),
        }
    }

    /// The shared scrape deadline has passed; further calls would fail too.
    pub fn is_deadline(&self) -> bool {
        matches!(self, CollectError::Fetch(FetchError::Timeout))
    }
}
