use crate::domain::{Icon, StatusCode, StatusEntry};
use std::collections::HashMap;

pub type NodeId = usize;

pub const ROOT_ID: &str = ".";
const ROOT_NAME: &str = "Changes";

/// Auto-expansion stops at nodes with more children than this.
const EXPAND_CHILD_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Canonical '/'-joined path prefix; the root is `"."`.
    pub id: String,
    /// Last path segment.
    pub name: String,
    pub children: Vec<NodeId>,
    /// Back-reference for upward traversal; `None` on the root.
    pub parent: Option<NodeId>,
    /// Sum of all descendant leaf sizes, including self for leaves.
    pub size: u64,
    /// Raw status code, set on leaves only.
    pub status: Option<StatusCode>,
    pub icon: Option<Icon>,
}

/// Hierarchical view over a flat status listing. Nodes live in an arena and
/// reference each other by index, so parent links stay non-owning.
#[derive(Debug, Clone)]
pub struct ChangeTree {
    nodes: Vec<TreeNode>,
    by_id: HashMap<String, NodeId>,
}

impl Default for ChangeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeTree {
    pub fn new() -> Self {
        let root = TreeNode {
            id: ROOT_ID.to_string(),
            name: ROOT_NAME.to_string(),
            children: Vec::new(),
            parent: None,
            size: 0,
            status: None,
            icon: None,
        };
        let mut by_id = HashMap::new();
        by_id.insert(ROOT_ID.to_string(), 0);
        Self {
            nodes: vec![root],
            by_id,
        }
    }

    /// Builds a fresh tree from an ordered status listing. Each entry's size
    /// is added to every node on its path so directory totals reflect all
    /// descendants; the leaf additionally records its status code and icon.
    pub fn build(entries: &[StatusEntry]) -> Self {
        let mut tree = Self::new();

        for entry in entries {
            let segments: Vec<&str> = entry.path.split('/').collect();
            tree.nodes[0].size += entry.size_bytes;

            let mut current = 0;
            let mut prefix = String::new();
            for (depth, segment) in segments.iter().enumerate() {
                if depth > 0 {
                    prefix.push('/');
                }
                prefix.push_str(segment);

                let node = tree.child_or_insert(current, &prefix, segment);
                tree.nodes[node].size += entry.size_bytes;
                if depth == segments.len() - 1 {
                    tree.nodes[node].status = Some(entry.code);
                    tree.nodes[node].icon = Some(Icon::for_code(entry.code));
                }
                current = node;
            }
        }

        tree
    }

    fn child_or_insert(&mut self, parent: NodeId, id: &str, name: &str) -> NodeId {
        if let Some(&existing) = self.by_id.get(id)
            && self.nodes[existing].parent == Some(parent)
        {
            return existing;
        }

        let node = self.nodes.len();
        self.nodes.push(TreeNode {
            id: id.to_string(),
            name: name.to_string(),
            children: Vec::new(),
            parent: Some(parent),
            size: 0,
            status: None,
            icon: None,
        });
        self.nodes[parent].children.push(node);
        self.by_id.insert(id.to_string(), node);
        node
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Lazily enumerates leaf descendants of `start` (including `start`
    /// itself when it has no children). Iteration uses an explicit stack, so
    /// depth is bounded by the longest path, and the iterator can be
    /// recreated at any time.
    pub fn leaves(&self, start: NodeId) -> Leaves<'_> {
        Leaves {
            tree: self,
            stack: vec![start],
        }
    }

    /// Default expansion list for the presentation layer: the root plus every
    /// node reachable from the top level without passing through a node that
    /// has more than five children.
    pub fn expanded_ids(&self) -> Vec<String> {
        let mut expanded = vec![ROOT_ID.to_string()];
        let mut stack: Vec<NodeId> = self.nodes[0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.children.len() > EXPAND_CHILD_LIMIT {
                continue;
            }
            expanded.push(node.id.clone());
            stack.extend(node.children.iter().rev());
        }
        expanded
    }
}

pub struct Leaves<'a> {
    tree: &'a ChangeTree,
    stack: Vec<NodeId>,
}

impl Iterator for Leaves<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            let node = &self.tree.nodes[id];
            if node.children.is_empty() {
                return Some(id);
            }
            self.stack.extend(node.children.iter().rev());
        }
        None
    }
}
