//! YouTube reference parsing.

use crate::error::{Result, ShadowifyError};
use url::Url;

const WATCH_PATTERN: &str = "youtube.com/watch";
const SHORT_LINK_PREFIXES: [&str; 3] = ["https://youtu.be/", "http://youtu.be/", "youtu.be/"];

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Extract a video id from a full watch URL, a youtu.be short link, or a bare id.
///
/// Anything that matches neither URL form is returned trimmed, as-is, as long
/// as it could be an id at all.
pub fn normalize_reference(raw: &str) -> Result<String> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(ShadowifyError::InvalidReference(
            "reference must not be empty".to_string(),
        ));
    }

    let id = if input.contains(WATCH_PATTERN) {
        parse_url(input)?
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ShadowifyError::InvalidReference(format!("missing 'v' parameter in {}", input))
            })?
    } else if SHORT_LINK_PREFIXES.iter().any(|p| input.starts_with(p)) {
        parse_url(input)?
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ShadowifyError::InvalidReference(format!("missing video id in {}", input))
            })?
    } else {
        input.to_string()
    };

    validate_id(&id)?;
    Ok(id)
}

/// Ids never contain path separators, whitespace or control characters.
fn validate_id(id: &str) -> Result<()> {
    match id.chars().find(|&c| matches!(c, '/' | '\\') || c.is_whitespace() || c.is_control()) {
        Some(c) => Err(ShadowifyError::InvalidReference(format!(
            "unexpected character {:?} in video id '{}'",
            c, id
        ))),
        None => Ok(()),
    }
}

fn parse_url(input: &str) -> Result<Url> {
    let candidate = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    Url::parse(&candidate)
        .map_err(|e| ShadowifyError::InvalidReference(format!("malformed URL '{}': {}", input, e)))
}
