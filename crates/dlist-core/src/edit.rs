use log::trace;

use crate::bookmark::Bookmark;
use crate::core::Selection;
use crate::document::{Document, NodeId, Tag, TreeError};
use crate::ops::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Prepend,
    Append,
}

/// Mutable view of a document that journals every structural step and keeps
/// the selection bookmark in step with it.
pub struct TreeEdit<'a> {
    doc: &'a mut Document,
    bookmark: Bookmark,
    ops: Vec<Op>,
}

impl<'a> TreeEdit<'a> {
    pub fn new(doc: &'a mut Document, selection: &Selection) -> Self {
        Self {
            doc,
            bookmark: Bookmark::capture(selection),
            ops: Vec::new(),
        }
    }

    pub fn doc(&self) -> &Document {
        self.doc
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn finish(self) -> (Selection, Vec<Op>) {
        (self.bookmark.resolve(self.doc), self.ops)
    }

    fn record(&mut self, op: Op) {
        trace!("{op:?}");
        self.bookmark.remap(&op, self.doc);
        self.ops.push(op);
    }

    pub fn create_element(&mut self, tag: Tag) -> NodeId {
        let node = self.doc.create_element(tag.clone(), Default::default());
        self.record(Op::Create { node, tag });
        node
    }

    /// Creates an unattached element with the tag and attributes of `source`.
    pub fn clone_element(&mut self, source: NodeId) -> Result<NodeId, TreeError> {
        let (tag, attrs) = self.doc.element_parts(source)?;
        let node = self.doc.create_element(tag.clone(), attrs);
        self.record(Op::Create { node, tag });
        Ok(node)
    }

    pub fn rename(&mut self, node: NodeId, tag: Tag) -> Result<(), TreeError> {
        let from = self.doc.set_tag(node, tag.clone())?;
        if from != tag {
            self.record(Op::Rename { node, from, to: tag });
        }
        Ok(())
    }

    pub fn detach(&mut self, node: NodeId) -> Result<(), TreeError> {
        if let Some((parent, index)) = self.doc.detach_raw(node)? {
            self.record(Op::Detach {
                node,
                parent,
                index,
            });
        }
        Ok(())
    }

    /// Unlinks `node` and retires it together with its subtree.
    pub fn remove(&mut self, node: NodeId) -> Result<(), TreeError> {
        if node == NodeId::ROOT {
            return Err(TreeError::RootImmutable("removed"));
        }
        let slot = self.doc.detach_raw(node)?;
        self.record(Op::Remove {
            node,
            parent: slot.map(|(parent, _)| parent),
            index: slot.map(|(_, index)| index).unwrap_or(0),
        });
        self.doc.mark_removed(node)
    }

    fn attach(&mut self, parent: NodeId, index: usize, node: NodeId) -> Result<(), TreeError> {
        self.doc.insert_raw(parent, index, node)?;
        let index = self.doc.index_in_parent(node).ok_or(TreeError::Detached(node))?;
        self.record(Op::Attach {
            node,
            parent,
            index,
        });
        Ok(())
    }

    pub fn insert_before(&mut self, node: NodeId, reference: NodeId) -> Result<(), TreeError> {
        if node == reference {
            return Ok(());
        }
        self.check_movable(node, reference)?;
        self.detach(node)?;
        let parent = self.doc.parent(reference).ok_or(TreeError::Detached(reference))?;
        let index = self
            .doc
            .index_in_parent(reference)
            .ok_or(TreeError::Detached(reference))?;
        self.attach(parent, index, node)
    }

    pub fn append_to(&mut self, parent: NodeId, node: NodeId) -> Result<(), TreeError> {
        if node == parent || self.doc.is_ancestor_of(node, parent) {
            return Err(TreeError::Cycle { node });
        }
        self.detach(node)?;
        self.attach(parent, usize::MAX, node)
    }

    fn check_movable(&self, node: NodeId, reference: NodeId) -> Result<(), TreeError> {
        let parent = self.doc.parent(reference).ok_or(TreeError::Detached(reference))?;
        if parent == node || self.doc.is_ancestor_of(node, parent) {
            return Err(TreeError::Cycle { node });
        }
        Ok(())
    }

    /// Moves all children of `from` to the start or end of `to`.
    ///
    /// The move is journaled even when `from` is empty, so positions held in
    /// `from` follow it into `to`.
    pub fn move_children(
        &mut self,
        from: NodeId,
        to: NodeId,
        placement: Placement,
    ) -> Result<usize, TreeError> {
        let index = match placement {
            Placement::Prepend => 0,
            Placement::Append => self.doc.children(to).len(),
        };
        let count = self.doc.move_children_raw(from, to, index)?;
        self.record(Op::MoveChildren {
            from,
            to,
            index,
            count,
        });
        Ok(count)
    }

    /// Splits the parent of `child` so that `child` and its following
    /// siblings move into a shallow copy placed right after the parent.
    ///
    /// Returns the copy.
    pub fn split_before(&mut self, child: NodeId) -> Result<NodeId, TreeError> {
        let parent = self.doc.parent(child).ok_or(TreeError::Detached(child))?;
        if parent == NodeId::ROOT {
            return Err(TreeError::RootImmutable("split"));
        }
        let at = self
            .doc
            .index_in_parent(child)
            .ok_or(TreeError::Detached(child))?;
        let new_node = self.clone_element(parent)?;
        self.doc.split_raw(parent, at, new_node)?;
        self.record(Op::Split {
            node: parent,
            new_node,
            at,
        });
        Ok(new_node)
    }

    /// Splits every element from the parent of `descendant` up to and
    /// including `ancestor`, so that `descendant` starts the second half.
    ///
    /// Returns the second half of `ancestor`.
    pub fn split_element_before(
        &mut self,
        ancestor: NodeId,
        descendant: NodeId,
    ) -> Result<NodeId, TreeError> {
        if !self.doc.is_ancestor_of(ancestor, descendant) {
            return Err(TreeError::NotADescendant {
                node: descendant,
                ancestor,
            });
        }
        let mut child = descendant;
        loop {
            let parent = self.doc.parent(child).ok_or(TreeError::Detached(child))?;
            let half = self.split_before(child)?;
            if parent == ancestor {
                return Ok(half);
            }
            child = half;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point;
    use crate::document::Attrs;

    fn list_of_three() -> (Document, NodeId, Vec<NodeId>) {
        let mut doc = Document::new();
        let ul = doc.create_element(Tag::UnorderedList, Attrs::new());
        doc.append_child(doc.root(), ul).unwrap();
        let items = ["a", "b", "c"]
            .into_iter()
            .map(|label| {
                let li = doc.create_element(Tag::ListItem, Attrs::new());
                let text = doc.create_text(label);
                doc.append_child(ul, li).unwrap();
                doc.append_child(li, text).unwrap();
                li
            })
            .collect();
        (doc, ul, items)
    }

    #[test]
    fn split_before_moves_the_tail_into_a_copy() {
        let (mut doc, ul, items) = list_of_three();
        let selection = Selection::collapsed(Point::new(ul, 3));
        let mut edit = TreeEdit::new(&mut doc, &selection);
        let half = edit.split_before(items[1]).unwrap();
        let (selection, ops) = edit.finish();

        assert_eq!(doc.children(ul), &items[..1]);
        assert_eq!(doc.children(half), &items[1..]);
        assert_eq!(doc.tag(half), Some(&Tag::UnorderedList));
        assert_eq!(selection.anchor, Point::new(half, 2));
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn deep_split_stops_at_the_ancestor() {
        let (mut doc, ul, items) = list_of_three();
        let text = doc.children(items[1])[0];
        let selection = Selection::collapsed(Point::new(text, 0));
        let mut edit = TreeEdit::new(&mut doc, &selection);
        let half = edit.split_element_before(ul, text).unwrap();
        drop(edit);

        assert_eq!(doc.children(doc.root()).len(), 2);
        assert_eq!(doc.children(ul).len(), 2);
        assert!(doc.children(doc.children(ul)[1]).is_empty());
        assert_eq!(doc.children(half).len(), 2);
        assert_eq!(doc.text_content(half), "bc");
    }

    #[test]
    fn positions_in_an_empty_element_follow_its_children() {
        let (mut doc, ul, items) = list_of_three();
        let empty = doc.create_element(Tag::ListItem, Attrs::new());
        doc.append_child(ul, empty).unwrap();
        let selection = Selection::collapsed(Point::new(empty, 0));
        let mut edit = TreeEdit::new(&mut doc, &selection);

        assert_eq!(edit.move_children(empty, items[0], Placement::Append), Ok(0));
        edit.remove(empty).unwrap();
        let (selection, ops) = edit.finish();

        assert_eq!(selection.anchor, Point::new(items[0], 1));
        assert_eq!(ops[0].kind(), "move_children");
    }

    #[test]
    fn failed_moves_leave_the_tree_alone() {
        let (mut doc, ul, items) = list_of_three();
        let selection = Selection::collapsed(Point::new(ul, 0));
        let mut edit = TreeEdit::new(&mut doc, &selection);
        assert_eq!(
            edit.insert_before(ul, items[0]),
            Err(TreeError::Cycle { node: ul })
        );
        assert!(edit.ops().is_empty());
        assert_eq!(doc.children(ul), items.as_slice());
    }
}
