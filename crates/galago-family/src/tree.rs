use thiserror::Error;

/// A node identifier within a decision tree arena.
pub type NodeId = usize;

/// One node record of the arena. Inner nodes carry both children,
/// terminals carry none; links are indices, never owning pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeNode {
    pub parent: Option<NodeId>,
    pub children: Option<(NodeId, NodeId)>,
}

impl TreeNode {
    pub fn is_terminal(&self) -> bool {
        self.children.is_none()
    }
}

/// A root-to-terminal path: the inner nodes visited with the branch taken
/// at each (`true` = the true-child edge), ending in a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePath {
    pub steps: Vec<(NodeId, bool)>,
    pub terminal: NodeId,
}

/// Rejection of a serialized tree description at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("tree description is empty")]
    Empty,
    #[error("node {node} has exactly one child; inner nodes must have two")]
    MalformedNode { node: NodeId },
    #[error("node {node} references out-of-range node {reference}")]
    BadReference { node: NodeId, reference: NodeId },
    #[error("node {node} disagrees with its parent link")]
    InconsistentParent { node: NodeId },
    #[error("tree has no root")]
    NoRoot,
    #[error("nodes {first} and {second} are both roots")]
    MultipleRoots { first: NodeId, second: NodeId },
}

/// A rooted binary decision tree stored as a flat arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    root: NodeId,
    terminals: Vec<NodeId>,
}

impl DecisionTree {
    /// Builds the arena from `(parent, true_child, false_child)` triples,
    /// one per node, indexed by position.
    pub fn from_description(
        description: &[(Option<NodeId>, Option<NodeId>, Option<NodeId>)],
    ) -> Result<Self, TreeError> {
        if description.is_empty() {
            return Err(TreeError::Empty);
        }
        let num_nodes = description.len();
        let check = |node: NodeId, reference: Option<NodeId>| match reference {
            Some(reference) if reference >= num_nodes => {
                Err(TreeError::BadReference { node, reference })
            }
            _ => Ok(()),
        };

        let mut nodes = Vec::with_capacity(num_nodes);
        let mut root = None;
        for (node, &(parent, true_child, false_child)) in description.iter().enumerate() {
            check(node, parent)?;
            check(node, true_child)?;
            check(node, false_child)?;
            let children = match (true_child, false_child) {
                (Some(t), Some(f)) => Some((t, f)),
                (None, None) => None,
                _ => return Err(TreeError::MalformedNode { node }),
            };
            if parent.is_none() {
                if let Some(first) = root {
                    return Err(TreeError::MultipleRoots {
                        first,
                        second: node,
                    });
                }
                root = Some(node);
            }
            nodes.push(TreeNode { parent, children });
        }
        let root = root.ok_or(TreeError::NoRoot)?;

        for (node, record) in nodes.iter().enumerate() {
            if let Some((true_child, false_child)) = record.children {
                for child in [true_child, false_child] {
                    if nodes[child].parent != Some(node) {
                        return Err(TreeError::InconsistentParent { node: child });
                    }
                }
            }
        }

        let terminals = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_terminal())
            .map(|(id, _)| id)
            .collect();

        Ok(Self {
            nodes,
            root,
            terminals,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, node: NodeId) -> &TreeNode {
        &self.nodes[node]
    }

    pub fn is_terminal(&self, node: NodeId) -> bool {
        self.nodes[node].is_terminal()
    }

    /// Terminal node ids in increasing order.
    pub fn terminals(&self) -> &[NodeId] {
        &self.terminals
    }

    /// Enumerates all root-to-terminal paths, true-branch first.
    pub fn paths(&self) -> Vec<TreePath> {
        let mut paths = Vec::with_capacity(self.terminals.len());
        let mut stack = vec![(self.root, Vec::new())];
        while let Some((node, steps)) = stack.pop() {
            match self.nodes[node].children {
                Some((true_child, false_child)) => {
                    // Pushed false-first so the true branch is visited first.
                    let mut false_steps = steps.clone();
                    false_steps.push((node, false));
                    stack.push((false_child, false_steps));
                    let mut true_steps = steps;
                    true_steps.push((node, true));
                    stack.push((true_child, true_steps));
                }
                None => paths.push(TreePath {
                    steps,
                    terminal: node,
                }),
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Root 0 with children 1 (true) and 2 (false); 2 splits into 3 and 4.
    fn two_level() -> Vec<(Option<NodeId>, Option<NodeId>, Option<NodeId>)> {
        vec![
            (None, Some(1), Some(2)),
            (Some(0), None, None),
            (Some(0), Some(3), Some(4)),
            (Some(2), None, None),
            (Some(2), None, None),
        ]
    }

    #[test]
    fn builds_and_enumerates_paths() {
        let tree = DecisionTree::from_description(&two_level()).expect("well-formed tree");
        assert_eq!(tree.root(), 0);
        assert_eq!(tree.terminals(), &[1, 3, 4]);

        let paths = tree.paths();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0].steps, vec![(0, true)]);
        assert_eq!(paths[0].terminal, 1);
        assert_eq!(paths[1].steps, vec![(0, false), (2, true)]);
        assert_eq!(paths[1].terminal, 3);
        assert_eq!(paths[2].steps, vec![(0, false), (2, false)]);
        assert_eq!(paths[2].terminal, 4);
    }

    #[test]
    fn single_node_tree_is_one_terminal() {
        let tree = DecisionTree::from_description(&[(None, None, None)]).expect("single terminal");
        assert!(tree.is_terminal(0));
        assert_eq!(tree.paths().len(), 1);
        assert!(tree.paths()[0].steps.is_empty());
    }

    #[test]
    fn one_missing_child_is_fatal() {
        let mut description = two_level();
        description[2].2 = None;
        assert_eq!(
            DecisionTree::from_description(&description),
            Err(TreeError::MalformedNode { node: 2 })
        );
    }

    #[test]
    fn inconsistent_parent_is_fatal() {
        let mut description = two_level();
        description[3].0 = Some(0);
        assert_eq!(
            DecisionTree::from_description(&description),
            Err(TreeError::InconsistentParent { node: 3 })
        );
    }

    #[test]
    fn multiple_roots_are_fatal() {
        let description = vec![(None, None, None), (None, None, None)];
        assert_eq!(
            DecisionTree::from_description(&description),
            Err(TreeError::MultipleRoots {
                first: 0,
                second: 1
            })
        );
    }
}
