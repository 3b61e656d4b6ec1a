//! Token extraction from an OAuth redirect URL.

use std::borrow::Cow;

/// Access/refresh pair pulled out of a redirect fragment.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Decode one form-urlencoded component: `+` is a space, `%XX` is a byte.
fn decode_component(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['+', '%']) {
        return Cow::Borrowed(raw);
    }
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(_) => Cow::Owned(spaced),
    }
}

/// `key=value&...` pairs after the first `#`, percent-decoded. Empty pairs
/// are skipped.
pub fn fragment_params(url: &str) -> impl Iterator<Item = (Cow<'_, str>, Cow<'_, str>)> {
    url.split_once('#')
        .map(|(_, fragment)| fragment)
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
}

/// Pull `access_token` and `refresh_token` out of the fragment of `url`.
/// The first occurrence of each key wins. Returns `None` when either is
/// missing or empty.
#[must_use]
pub fn extract_tokens(url: &str) -> Option<TokenPair> {
    let mut access = None;
    let mut refresh = None;
    for (key, value) in fragment_params(url) {
        match key.as_ref() {
            "access_token" if access.is_none() => access = Some(value.into_owned()),
            "refresh_token" if refresh.is_none() => refresh = Some(value.into_owned()),
            _ => {}
        }
    }
    let access_token = access.filter(|t| !t.is_empty())?;
    let refresh_token = refresh.filter(|t| !t.is_empty())?;
    Some(TokenPair { access_token, refresh_token })
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
