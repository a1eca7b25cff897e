use crate::text_encoding::EncodingFallback;
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, error, info};

pub(crate) const MAX_DEPTH: usize = 10;

/// One entry of an exported directory tree, `depth` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TreeRecord {
    pub(crate) depth: usize,
    pub(crate) name: String,
}

impl TreeRecord {
    pub(crate) fn new(depth: usize, name: &str) -> Self {
        TreeRecord {
            depth,
            name: name.to_string(),
        }
    }
}

/// Depth 1 is `|——`, every deeper level adds one `| ` before the `|-` marker.
fn make_depth_markers() -> Vec<(usize, String)> {
    (1..=MAX_DEPTH)
        .map(|depth| {
            let marker = if depth == 1 {
                "|——".to_string()
            } else {
                format!("{}|-", "| ".repeat(depth - 1))
            };
            (depth, marker)
        })
        .collect()
}

static DEPTH_MARKERS: LazyLock<Vec<(usize, String)>> = LazyLock::new(make_depth_markers);

/// Returns `None` for anything that is not a tree entry: headers, blank
/// lines, footers, or levels deeper than the table knows about.
pub(crate) fn classify_line(line: &str) -> Option<TreeRecord> {
    let line = line.trim();
    for (depth, marker) in DEPTH_MARKERS.iter() {
        if let Some(rest) = line.strip_prefix(marker.as_str()) {
            let name = rest.trim();
            if name.is_empty() {
                debug!("Entry without a name at depth {depth}: {line:?}");
                return None;
            }
            return Some(TreeRecord::new(*depth, name));
        }
    }
    None
}

pub(crate) fn parse_text(text: &str) -> Vec<TreeRecord> {
    let mut records = vec![];
    let mut ignored = 0;
    for line in text.split(['\r', '\n']) {
        match classify_line(line) {
            Some(record) => records.push(record),
            None => ignored += 1,
        }
    }
    debug!("Parsed {} entries, ignored {ignored} lines", records.len());
    records
}

/// Reads and parses a tree listing. A file that cannot be decoded yields no
/// records, only a failure to read the file at all is an error.
pub(crate) fn parse_file(path: &Path, encodings: &EncodingFallback) -> anyhow::Result<Vec<TreeRecord>> {
    let bytes = fs::read(path).with_context(|| format!("Unable to read tree file {path:?}"))?;
    let text = match encodings.decode(&bytes) {
        Ok((text, enc)) => {
            info!("Reading tree file {path:?} as {enc}");
            text
        }
        Err(e) => {
            error!("Error reading file: {e}");
            return Ok(vec![]);
        }
    };
    Ok(parse_text(&text))
}
