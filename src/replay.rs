//! Replays parsed tree records as directories and empty files.
//!
//! The listing carries no parent links, only the order of the records and
//! their depth. Each record is placed relative to the last successfully
//! placed one, so a single bad entry can shift everything after it. Faults
//! therefore stop the replay, or with [`FaultPolicy::SkipSubtree`] drop the
//! faulting entry together with everything nested below it.

use crate::fs::SkeletonFs;
use crate::sanitize::{fix_garbled, sanitize_name};
use crate::skeleton::{NodeId, NodeKind, SkeletonTree};
use crate::tree_listing::TreeRecord;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// `name.ext` with a 2 to 4 character alphanumeric extension.
static FILE_NAME_RE: LazyLock<Option<Regex>> = LazyLock::new(|| match Regex::new(r"^.*\.[a-zA-Z0-9]{2,4}$") {
    Ok(re) => Some(re),
    Err(re_err) => {
        warn!("Error while parsing: {re_err}");
        None
    }
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub(crate) enum FaultPolicy {
    /// Stop at the first fault, leaving the partial tree on disk.
    #[default]
    #[strum(to_string = "abort")]
    Abort,
    /// Record the fault, skip everything nested below it and carry on.
    #[strum(to_string = "skip-subtree")]
    SkipSubtree,
}

impl FaultPolicy {
    pub(crate) fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "abort" => Some(FaultPolicy::Abort),
            "skip-subtree" | "skip_subtree" => Some(FaultPolicy::SkipSubtree),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(crate) enum PreviousKind {
    None,
    #[strum(to_string = "dir")]
    Directory,
    #[strum(to_string = "file")]
    File,
}

#[derive(Debug, Error)]
pub(crate) enum ReplayFault {
    #[error("level error! {name:?} at depth {depth} cannot follow a {previous_kind} at depth {previous_depth}")]
    DepthJump {
        name: String,
        depth: usize,
        previous_depth: usize,
        previous_kind: PreviousKind,
    },
    #[error("no directory to place file {name:?} at depth {depth}")]
    OrphanFile { name: String, depth: usize },
    #[error("invalid name {name:?} at depth {depth}")]
    InvalidName { name: String, depth: usize },
    #[error("error creating directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        depth: usize,
        #[source]
        source: io::Error,
    },
    #[error("error creating file {path:?}: {source}")]
    CreateFile {
        path: PathBuf,
        depth: usize,
        #[source]
        source: io::Error,
    },
}

impl ReplayFault {
    pub(crate) fn depth(&self) -> usize {
        match self {
            ReplayFault::DepthJump { depth, .. }
            | ReplayFault::OrphanFile { depth, .. }
            | ReplayFault::InvalidName { depth, .. }
            | ReplayFault::CreateDir { depth, .. }
            | ReplayFault::CreateFile { depth, .. } => *depth,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ReplayOptions {
    pub(crate) fix_garbled: bool,
    pub(crate) fault_policy: FaultPolicy,
}

#[derive(Debug, Clone)]
pub(crate) enum ReplayEvent {
    Started { total: usize },
    Placed { kind: NodeKind, path: PathBuf },
    Skipped { name: String },
    Anchored { name: String },
    Faulted { message: String },
}

#[derive(Debug, Default)]
pub(crate) struct ReplayReport {
    pub(crate) directories: usize,
    pub(crate) files: usize,
    pub(crate) skipped: usize,
    pub(crate) faults: Vec<ReplayFault>,
    pub(crate) aborted: bool,
}

impl ReplayReport {
    pub(crate) fn is_complete(&self) -> bool {
        !self.aborted && self.faults.is_empty()
    }
}

/// Where the replay believes it is. Only successful placements move it.
#[derive(Debug)]
pub(crate) struct ReplayCursor {
    tree: SkeletonTree,
    previous: Option<NodeId>,
    /// Records deeper than this are discarded, 0 when not skipping.
    skip_depth: usize,
}

impl ReplayCursor {
    fn new(root: &Path) -> Self {
        ReplayCursor {
            tree: SkeletonTree::new(root),
            previous: None,
            skip_depth: 0,
        }
    }

    pub(crate) fn previous_depth(&self) -> usize {
        self.previous.map_or(1, |id| self.tree.node(id).depth)
    }

    pub(crate) fn previous_kind(&self) -> PreviousKind {
        match self.previous.map(|id| self.tree.node(id).kind) {
            None => PreviousKind::None,
            Some(NodeKind::File) => PreviousKind::File,
            Some(NodeKind::Directory) | Some(NodeKind::Root) => PreviousKind::Directory,
        }
    }

    pub(crate) fn current_path(&self) -> &Path {
        match self.previous {
            None => self.tree.root_path(),
            Some(id) => &self.tree.node(self.tree.directory_of(id)).path,
        }
    }

    /// The directory a new entry at `depth` belongs in, relative to the
    /// previously placed entry.
    fn container_for(&self, depth: usize, name: &str) -> Result<NodeId, ReplayFault> {
        let Some(previous) = self.previous else {
            return Ok(SkeletonTree::ROOT);
        };
        let previous_depth = self.previous_depth();
        let jump = || ReplayFault::DepthJump {
            name: name.to_string(),
            depth,
            previous_depth,
            previous_kind: self.previous_kind(),
        };
        match self.previous_kind() {
            // child, sibling, or an ancestor's sibling
            PreviousKind::Directory | PreviousKind::None => {
                if depth == previous_depth + 1 {
                    Ok(previous)
                } else if depth <= previous_depth {
                    Ok(self.tree.ancestor_at(previous, depth - 1))
                } else {
                    Err(jump())
                }
            }
            // a file never has children
            PreviousKind::File => {
                if depth <= previous_depth {
                    Ok(self.tree.ancestor_at(previous, depth - 1))
                } else {
                    Err(jump())
                }
            }
        }
    }
}

enum Placement {
    Created(NodeId),
    /// A directory seen before any depth 1 entry, it stands in for the root.
    Anchored,
}

/// Decides whether an entry is a directory or a file. Anything followed by
/// a deeper entry has children and so must be a directory, whatever its name
/// looks like.
pub(crate) fn classify(name: &str, depth: usize, next_depth: Option<usize>) -> NodeKind {
    if depth == 1 {
        return NodeKind::Directory;
    }
    let looks_like_file = FILE_NAME_RE.as_ref().is_some_and(|re| re.is_match(name));
    if !looks_like_file {
        return NodeKind::Directory;
    }
    if let Some(next_depth) = next_depth
        && next_depth > depth
    {
        warn!("Treating {name:?} as a directory, it has entries below it");
        return NodeKind::Directory;
    }
    NodeKind::File
}

pub(crate) struct TreeReplayer<'a> {
    fs: &'a dyn SkeletonFs,
    options: ReplayOptions,
}

impl<'a> TreeReplayer<'a> {
    pub(crate) fn new(fs: &'a dyn SkeletonFs, options: ReplayOptions) -> Self {
        TreeReplayer { fs, options }
    }

    /// Wipes `root` and rebuilds it from `records`. Faults are reported in
    /// the returned report, only failing to reset the root is an error.
    pub(crate) fn replay(
        &self,
        records: &[TreeRecord],
        root: &Path,
        on_event: &mut dyn FnMut(ReplayEvent),
    ) -> anyhow::Result<ReplayReport> {
        self.fs.reset_root(root)?;
        on_event(ReplayEvent::Started {
            total: records.len(),
        });

        let mut cursor = ReplayCursor::new(root);
        let mut report = ReplayReport::default();
        for (index, record) in records.iter().enumerate() {
            let name = sanitize_name(&record.name);
            let depth = record.depth;

            if cursor.skip_depth > 0 && depth > cursor.skip_depth {
                info!("ignore : {name}");
                report.skipped += 1;
                on_event(ReplayEvent::Skipped { name });
                continue;
            }
            cursor.skip_depth = 0;

            let next_depth = records.get(index + 1).map(|r| r.depth);
            let kind = classify(&name, depth, next_depth);
            match self.place(&mut cursor, depth, &name, kind) {
                Ok(Placement::Created(id)) => {
                    let node = cursor.tree.node(id);
                    match kind {
                        NodeKind::File => report.files += 1,
                        _ => report.directories += 1,
                    }
                    debug!("{depth} {kind} : {:?}", node.path);
                    on_event(ReplayEvent::Placed {
                        kind,
                        path: node.path.clone(),
                    });
                }
                Ok(Placement::Anchored) => {
                    warn!("{name:?} at depth {depth} has no parent entry, using {root:?}");
                    on_event(ReplayEvent::Anchored { name });
                }
                Err(fault) => {
                    error!("{fault}, current dir: {:?}", cursor.current_path());
                    cursor.skip_depth = fault.depth();
                    on_event(ReplayEvent::Faulted {
                        message: fault.to_string(),
                    });
                    report.faults.push(fault);
                    if self.options.fault_policy == FaultPolicy::Abort {
                        report.aborted = true;
                        break;
                    }
                }
            }
        }
        debug!("Replay placed {} nodes", cursor.tree.len() - 1);
        Ok(report)
    }

    fn place(
        &self,
        cursor: &mut ReplayCursor,
        depth: usize,
        name: &str,
        kind: NodeKind,
    ) -> Result<Placement, ReplayFault> {
        // would resolve outside the parent directory
        if name == "." || name == ".." {
            return Err(ReplayFault::InvalidName {
                name: name.to_string(),
                depth,
            });
        }
        let parent = if depth == 1 {
            SkeletonTree::ROOT
        } else if cursor.previous.is_none() {
            if kind == NodeKind::File {
                return Err(ReplayFault::OrphanFile {
                    name: name.to_string(),
                    depth,
                });
            }
            let root_path = cursor.tree.root_path().to_path_buf();
            cursor.previous = Some(cursor.tree.push(SkeletonTree::ROOT, depth, NodeKind::Directory, root_path));
            return Ok(Placement::Anchored);
        } else {
            cursor.container_for(depth, name)?
        };

        let mut path = cursor.tree.node(parent).path.join(name);
        if self.options.fix_garbled {
            path = fix_garbled(&path);
        }
        match kind {
            NodeKind::File => self.fs.touch(&path).map_err(|source| ReplayFault::CreateFile {
                path: path.clone(),
                depth,
                source,
            })?,
            _ => self.fs.create_dir(&path).map_err(|source| ReplayFault::CreateDir {
                path: path.clone(),
                depth,
                source,
            })?,
        }
        let id = cursor.tree.push(parent, depth, kind, path);
        cursor.previous = Some(id);
        Ok(Placement::Created(id))
    }
}
