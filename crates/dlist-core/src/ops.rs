use serde::{Deserialize, Serialize};

use crate::core::Selection;
use crate::document::{NodeId, Tag};

/// One structural step recorded while a command edits the tree.
///
/// Indices are child positions in the parent at the moment the op ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Create {
        node: NodeId,
        tag: Tag,
    },
    Rename {
        node: NodeId,
        from: Tag,
        to: Tag,
    },
    Detach {
        node: NodeId,
        parent: NodeId,
        index: usize,
    },
    Attach {
        node: NodeId,
        parent: NodeId,
        index: usize,
    },
    Remove {
        node: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<NodeId>,
        index: usize,
    },
    MoveChildren {
        from: NodeId,
        to: NodeId,
        index: usize,
        count: usize,
    },
    Split {
        node: NodeId,
        new_node: NodeId,
        at: usize,
    },
}

impl Op {
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Create { .. } => "create",
            Op::Rename { .. } => "rename",
            Op::Detach { .. } => "detach",
            Op::Attach { .. } => "attach",
            Op::Remove { .. } => "remove",
            Op::MoveChildren { .. } => "move_children",
            Op::Split { .. } => "split",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            selection_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn selection_after(mut self, selection_after: Selection) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
