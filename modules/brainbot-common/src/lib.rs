pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::BrainbotError;
pub use types::*;

use sha2::{Digest, Sha256};

/// Stable 16-hex-char identifier for an article, derived from its most
/// specific non-empty identity field (link, then guid, then title).
/// Must be stable across re-fetches of the same item.
///
/// ```
/// assert_eq!(brainbot_common::stable_id("https://example.com/a").len(), 16);
/// assert_eq!(
///     brainbot_common::stable_id("https://example.com/a"),
///     brainbot_common::stable_id("https://example.com/a"),
/// );
/// ```
pub fn stable_id(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Normalize a title for exact-match keying: trim, lowercase, collapse
/// internal whitespace runs to single spaces.
///
/// ```
/// assert_eq!(brainbot_common::normalize_title("  Hello   World  "), "hello world");
/// assert_eq!(brainbot_common::normalize_title("Breaking\tNews"), "breaking news");
/// ```
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}
