use std::path::{Path, PathBuf};
use strum_macros::Display;

pub(crate) type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(crate) enum NodeKind {
    #[strum(to_string = "root")]
    Root,
    #[strum(to_string = "dir")]
    Directory,
    #[strum(to_string = "file")]
    File,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) depth: usize,
    pub(crate) kind: NodeKind,
    pub(crate) path: PathBuf,
}

/// Arena of every node placed during one replay. Parents always come before
/// their children, node 0 is the destination root at depth 0.
#[derive(Debug, Clone)]
pub(crate) struct SkeletonTree {
    nodes: Vec<Node>,
}

impl SkeletonTree {
    pub(crate) const ROOT: NodeId = 0;

    pub(crate) fn new(root: &Path) -> Self {
        SkeletonTree {
            nodes: vec![Node {
                parent: None,
                depth: 0,
                kind: NodeKind::Root,
                path: root.to_path_buf(),
            }],
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub(crate) fn root_path(&self) -> &Path {
        &self.nodes[Self::ROOT].path
    }

    pub(crate) fn push(&mut self, parent: NodeId, depth: usize, kind: NodeKind, path: PathBuf) -> NodeId {
        self.nodes.push(Node {
            parent: Some(parent),
            depth,
            kind,
            path,
        });
        self.nodes.len() - 1
    }

    /// Walks up from `from` to the closest node at or above `depth`.
    pub(crate) fn ancestor_at(&self, from: NodeId, depth: usize) -> NodeId {
        let mut id = from;
        while self.nodes[id].depth > depth {
            match self.nodes[id].parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
        id
    }

    /// The directory a node lives in, or the node itself when it is a directory.
    pub(crate) fn directory_of(&self, id: NodeId) -> NodeId {
        let node = &self.nodes[id];
        match (node.kind, node.parent) {
            (NodeKind::File, Some(parent)) => parent,
            _ => id,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestor_walk() {
        let root = Path::new("/out");
        let mut tree = SkeletonTree::new(root);
        let a = tree.push(SkeletonTree::ROOT, 1, NodeKind::Directory, root.join("A"));
        let b = tree.push(a, 2, NodeKind::Directory, root.join("A/B"));
        let c = tree.push(b, 3, NodeKind::File, root.join("A/B/c.mkv"));

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.ancestor_at(c, 2), b);
        assert_eq!(tree.ancestor_at(c, 1), a);
        assert_eq!(tree.ancestor_at(c, 0), SkeletonTree::ROOT);
        assert_eq!(tree.ancestor_at(b, 5), b);
        assert_eq!(tree.directory_of(c), b);
        assert_eq!(tree.directory_of(b), b);
        assert_eq!(tree.node(c).kind, NodeKind::File);
        assert_eq!(tree.root_path(), root);
    }
}
