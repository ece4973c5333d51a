//! Immutable menu hierarchy built once from configuration.

#![allow(missing_docs)]

use crate::core::config::MenuItemConfig;
use crate::core::errors::{PanelError, Result};

/// Label of the synthetic root branch that owns the top-level items.
pub const ROOT_LABEL: &str = "Menu";

/// A menu node is either a branch (children, no action) or a leaf (action,
/// no children).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuNode {
    label: String,
    kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Branch(Vec<MenuNode>),
    Leaf { action: String, wait_for_key: bool },
}

impl MenuNode {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[must_use]
    pub const fn is_branch(&self) -> bool {
        matches!(self.kind, NodeKind::Branch(_))
    }

    /// Children of a branch; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[MenuNode] {
        match &self.kind {
            NodeKind::Branch(children) => children,
            NodeKind::Leaf { .. } => &[],
        }
    }

    /// Raw action string of a leaf.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Leaf { action, .. } => Some(action),
            NodeKind::Branch(_) => None,
        }
    }

    #[must_use]
    pub const fn wait_for_key(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Leaf {
                wait_for_key: true,
                ..
            }
        )
    }
}

/// The loaded menu. Positions are paths of child indices from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuTree {
    root: MenuNode,
}

impl MenuTree {
    /// Build the tree, rejecting structurally invalid items.
    pub fn load(items: &[MenuItemConfig]) -> Result<Self> {
        if items.is_empty() {
            return Err(PanelError::InvalidMenu {
                location: "menu".to_string(),
                details: "menu must contain at least one item".to_string(),
            });
        }
        let children = build_level(items, "menu")?;
        Ok(Self {
            root: MenuNode {
                label: ROOT_LABEL.to_string(),
                kind: NodeKind::Branch(children),
            },
        })
    }

    #[must_use]
    pub const fn root(&self) -> &MenuNode {
        &self.root
    }

    /// Node reached by following `path` from the root; `None` if any index
    /// is out of range or passes through a leaf.
    #[must_use]
    pub fn node_at(&self, path: &[usize]) -> Option<&MenuNode> {
        path.iter()
            .try_fold(&self.root, |node, &idx| node.children().get(idx))
    }

    /// Children of the branch at `path`; empty when `path` is not a branch.
    #[must_use]
    pub fn children_of(&self, path: &[usize]) -> &[MenuNode] {
        self.node_at(path).map_or(&[], MenuNode::children)
    }

    #[must_use]
    pub fn label_of(&self, path: &[usize]) -> Option<&str> {
        self.node_at(path).map(MenuNode::label)
    }

    /// Pre-order walk of every node below the root with its depth (top level = 0).
    #[must_use]
    pub fn depth_first(&self) -> Vec<(usize, &MenuNode)> {
        fn walk<'a>(nodes: &'a [MenuNode], depth: usize, out: &mut Vec<(usize, &'a MenuNode)>) {
            for node in nodes {
                out.push((depth, node));
                walk(node.children(), depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(self.root.children(), 0, &mut out);
        out
    }

    /// Total number of leaves.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.depth_first()
            .iter()
            .filter(|(_, node)| !node.is_branch())
            .count()
    }
}

fn build_level(items: &[MenuItemConfig], parent: &str) -> Result<Vec<MenuNode>> {
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| build_node(item, &format!("{parent}[{idx}]")))
        .collect()
}

fn build_node(item: &MenuItemConfig, location: &str) -> Result<MenuNode> {
    let fail = |details: &str| PanelError::InvalidMenu {
        location: location.to_string(),
        details: details.to_string(),
    };

    let label = item.label.trim();
    if label.is_empty() {
        return Err(fail("label must not be empty"));
    }

    let action = item.action.as_deref().map(str::trim);
    let kind = match (action, item.items.is_empty()) {
        (Some(_), false) => return Err(fail("item has both an action and child items")),
        (None, true) => return Err(fail("item has neither an action nor child items")),
        (Some(""), true) => return Err(fail("action must not be blank")),
        (Some(action), true) => NodeKind::Leaf {
            action: action.to_string(),
            wait_for_key: item.wait_for_key,
        },
        (None, false) => NodeKind::Branch(build_level(&item.items, &format!("{location}.items"))?),
    };

    Ok(MenuNode {
        label: label.to_string(),
        kind,
    })
}
