/// Returns true if `name` looks like a US-region node that belongs in the
/// West-Cowboy group.
///
/// Matches names containing `美国`, or an `US` token (any case) bounded by
/// non-alphanumeric characters or the string edges. The home node itself is
/// never a candidate.
pub fn is_west_cowboy_node(name: &str, home_proxy_name: &str) -> bool {
    if name == home_proxy_name {
        return false;
    }
    name.contains("美国") || has_us_token(name)
}

fn has_us_token(name: &str) -> bool {
    let bytes = name.as_bytes();
    // Multi-byte UTF-8 sequences never contain ASCII bytes, so they count as separators.
    let is_boundary = |index: Option<usize>| match index.and_then(|i| bytes.get(i)) {
        Some(byte) => !byte.is_ascii_alphanumeric(),
        None => true,
    };

    bytes.windows(2).enumerate().any(|(start, pair)| {
        pair[0].eq_ignore_ascii_case(&b'u')
            && pair[1].eq_ignore_ascii_case(&b's')
            && is_boundary(start.checked_sub(1))
            && is_boundary(Some(start + 2))
    })
}
