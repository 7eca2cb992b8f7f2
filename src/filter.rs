use thiserror::Error;
use url::Url;

// compared against the lowercased key, keep entries lowercase
pub const TRACKING_PARAMS: &[&str] = &[
    "utm_",
    "fbclid",
    "gclid",
    "ref",
    "source",
    "_ga",
    "_gl",
    "mc_",
    "mc_eid",
    "mkt_tok",
    "igshid",
    "yclid",
    "_hsenc",
    "_hsmi",
    "hsctatracking",
    "wbraid",
    "gbraid",
    "dclid",
    "zanpid",
    "msclkid",
    "trk",
    "trkcampaign",
    "sc_campaign",
    "hsa_",
    "session_id",
    "visitor_id",
    "_branch_",
    "_bta_",
    "wickedid",
    "wickedsource",
];

// user/session identifiers on any platform
pub const IDENTITY_PREFIXES: &[&str] = &["id", "sid", "uid", "user", "visitor", "session"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

pub fn is_tracking_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    TRACKING_PARAMS.iter().any(|param| lower.contains(param))
        || IDENTITY_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Strip tracking parameters and the fragment. Only absolute http(s) URLs pass.
pub fn clean(raw: &str) -> Result<String, FilterError> {
    let mut url = Url::parse(raw.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(FilterError::UnsupportedScheme(other.to_string())),
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_key(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.set_query(None);
    if !kept.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    // fragments never reach the server, so they are free to carry anything
    url.set_fragment(None);

    Ok(url.into())
}
