//! Player-name substitution.

/// Placeholder authored in story text.
pub const PLAYER_NAME_TOKEN: &str = "{playerName}";

/// Placeholder used by older story files.
pub const LEGACY_PLAYER_NAME_TOKEN: &str = "{PLAYER_NAME}";

/// Replaces every occurrence of both placeholders with `player_name`.
///
/// The input is scanned once, so placeholders inside `player_name` are
/// inserted literally. Text without a placeholder is returned unchanged.
/// Applied at render time only; the stored story keeps its tokens.
#[must_use]
pub fn personalize(text: &str, player_name: &str) -> String {
    if !text.contains('{') {
        return text.to_owned();
    }

    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('{') {
        output.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail
            .strip_prefix(PLAYER_NAME_TOKEN)
            .or_else(|| tail.strip_prefix(LEGACY_PLAYER_NAME_TOKEN))
        {
            output.push_str(player_name);
            rest = after;
        } else {
            output.push('{');
            rest = &tail[1..];
        }
    }
    output.push_str(rest);
    output
}
