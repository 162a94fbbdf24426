//! Route naming convention: `/post/...` is the `Post` asset.

/// Derive an asset name from a request route.
///
/// Takes the first path segment (ignoring any query string) and upper-cases
/// its first character. Returns `None` when the route has no first segment.
#[must_use]
pub fn asset_from_route(route: &str) -> Option<String> {
    let path = route.split(['?', '#']).next().unwrap_or_default();
    let segment = path.trim_start_matches('/').split('/').next()?;

    let mut chars = segment.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}
