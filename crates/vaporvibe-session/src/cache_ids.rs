//! Next-id counters for generated component and style fragments.

use crate::types::FragmentCache;

/// Prefix of generated component ids (`sl-gen-3`)
pub const COMPONENT_ID_PREFIX: &str = "sl-gen-";

/// Prefix of generated style ids (`sl-style-3`)
pub const STYLE_ID_PREFIX: &str = "sl-style-";

/// `1 + max(numeric suffix)` over keys carrying `prefix`, or 1 when none do.
#[must_use]
pub fn next_id_after(cache: &FragmentCache, prefix: &str) -> u64 {
    cache
        .keys()
        .filter_map(|key| key.strip_prefix(prefix))
        .filter(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .map_or(1, |max| max.saturating_add(1))
}
