use std::path::{Path, PathBuf};
use tracing::info;

const ILLEGAL_NAME_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Replaces characters that are illegal in a file name on at least one
/// major platform with `_`.
pub(crate) fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if ILLEGAL_NAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Some exports turn `s` into `*`. This undoes that on a constructed path.
pub(crate) fn fix_garbled(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if !s.contains('*') {
        return path.to_path_buf();
    }
    let fixed = PathBuf::from(s.replace('*', "s"));
    info!("Replace special chars: {path:?} -> {fixed:?}");
    fixed
}
