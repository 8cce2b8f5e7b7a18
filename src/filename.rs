//! File naming for downloaded tracks and their sidecars.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{MusicItem, Quality};

/// Template used when none is configured
pub const DEFAULT_TEMPLATE: &str = "{name} - {singer}";

/// Suffix appended to the destination while a transfer is in flight
pub const STAGING_SUFFIX: &str = "part";

static RESERVED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"[\\/:*?"<>|]"#).expect("static pattern is valid")
});

/// Replace characters that are invalid in file names on common platforms with `_`
pub fn sanitize(name: &str) -> String {
    RESERVED_CHARS.replace_all(name, "_").into_owned()
}

/// File name for `item` at `quality`: `"<name> - <singer>.<ext>"`
///
/// Items whose sanitized names collide share a destination; the later download
/// overwrites the earlier one.
pub fn compute_file_name(item: &MusicItem, quality: Quality) -> String {
    compute_file_name_with_template(item, quality, DEFAULT_TEMPLATE)
}

/// File name for `item` at `quality` using a `{name}` / `{singer}` template
///
/// Substitution happens before sanitization, so separators inside titles are
/// replaced too. A template that renders to nothing falls back to the item id.
pub fn compute_file_name_with_template(item: &MusicItem, quality: Quality, template: &str) -> String {
    let rendered = template
        .replace("{name}", &item.name)
        .replace("{singer}", &item.singer);
    let mut stem = sanitize(rendered.trim());
    if stem.is_empty() {
        stem = sanitize(item.id.as_str());
    }
    format!("{}.{}", stem, quality.extension())
}

/// Sidecar path next to `music_path` with the same stem
pub fn lyric_path(music_path: &Path, lyric_extension: &str) -> PathBuf {
    music_path.with_extension(lyric_extension.trim_start_matches('.'))
}

/// Path the transfer writes to before it is renamed into place
pub fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(STAGING_SUFFIX);
    destination.with_file_name(name)
}
