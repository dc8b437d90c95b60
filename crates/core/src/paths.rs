//! Encoding scheme used for the directory names under `~/.claude/projects`.
//!
//! Claude Code flattens an absolute project path into a single directory
//! name by escaping `-` as `--` and then turning every `/` into `-`. Decoding
//! reverses that in two passes so that a literal `-` in the original path
//! isn't mistaken for a path separator.

const ESCAPED_DASH_PLACEHOLDER: char = '\u{0}';

/// Turn an absolute filesystem path into the directory-name encoding Claude
/// Code uses under `~/.claude/projects`.
pub fn encode_project_path(path: &str) -> String {
    path.replace('-', "--").replace('/', "-")
}

/// Reverse [`encode_project_path`].
///
/// Every `--` in the encoded name is a literal `-` from the original path;
/// every remaining single `-` is a restored `/`. We swap `--` out for a
/// placeholder byte first so the single-dash pass can't confuse the two.
///
/// A name that doesn't start with `-` is legacy/unencoded data and is
/// returned verbatim rather than mangled by the `-` -> `/` pass.
pub fn decode_project_path(encoded: &str) -> String {
    if !encoded.starts_with('-') {
        return encoded.to_string();
    }
    let placeholder = encoded.replace("--", &ESCAPED_DASH_PLACEHOLDER.to_string());
    let with_slashes = placeholder.replace('-', "/");
    with_slashes.replace(ESCAPED_DASH_PLACEHOLDER, "-")
}

/// Heuristic used by the indexer to flag ambiguously-encoded legacy names:
/// the decoded display name still contains a `-` but the encoded form never
/// escaped one as `--`, so we can't tell whether that `-` was a literal dash
/// or an unescaped path separator. Ported verbatim from the original
/// implementation's check, including its conservatism: under this codec's
/// own `encode_project_path`, an encoded string with no `--` always decodes
/// to a display name with no `-` either, so this rarely fires on data this
/// encoder produced itself — it exists to flag names written by some other,
/// non-escaping producer.
pub fn is_ambiguous_encoding(encoded: &str) -> bool {
    let decoded = decode_project_path(encoded);
    let name = display_name(&decoded);
    name.contains('-') && !encoded.contains("--")
}

/// A short, human-friendly name for a project: the final path component of
/// the decoded path, or the decoded path itself if it has no components.
pub fn display_name(decoded_path: &str) -> String {
    decoded_path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| decoded_path.to_string())
}
