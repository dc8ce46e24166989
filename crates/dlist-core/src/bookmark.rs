use crate::core::{Point, Selection};
use crate::document::Document;
use crate::ops::Op;

/// Selection boundaries carried across structural edits.
///
/// Points addressing a text node survive every op untouched because text
/// nodes are only ever moved whole. Points addressing a child position in an
/// element are shifted as siblings come and go around them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    anchor: Point,
    focus: Point,
}

impl Bookmark {
    pub fn capture(selection: &Selection) -> Self {
        Self {
            anchor: selection.anchor.clone(),
            focus: selection.focus.clone(),
        }
    }

    /// Updates both boundaries for an op that has just been applied to `doc`.
    pub fn remap(&mut self, op: &Op, doc: &Document) {
        remap_point(&mut self.anchor, op, doc);
        remap_point(&mut self.focus, op, doc);
    }

    pub fn resolve(&self, doc: &Document) -> Selection {
        Selection {
            anchor: doc.clamp_point(&self.anchor),
            focus: doc.clamp_point(&self.focus),
        }
    }
}

fn remap_point(point: &mut Point, op: &Op, doc: &Document) {
    match *op {
        Op::Create { .. } | Op::Rename { .. } => {}
        Op::Detach { parent, index, .. } => {
            if point.node == parent && point.offset > index {
                point.offset -= 1;
            }
        }
        Op::Attach { parent, index, .. } => {
            if point.node == parent && point.offset > index {
                point.offset += 1;
            }
        }
        Op::Remove {
            node,
            parent: Some(parent),
            index,
        } => {
            if doc.ancestors_inclusive(point.node).any(|n| n == node) {
                *point = Point::new(parent, index);
            } else if point.node == parent && point.offset > index {
                point.offset -= 1;
            }
        }
        Op::Remove { parent: None, .. } => {}
        Op::MoveChildren {
            from,
            to,
            index,
            count,
        } => {
            if point.node == from {
                *point = Point::new(to, index + point.offset);
            } else if point.node == to && point.offset > index {
                point.offset += count;
            }
        }
        Op::Split { node, new_node, at } => {
            if point.node == node && point.offset > at {
                *point = Point::new(new_node, point.offset - at);
                return;
            }
            let (Some(grandparent), Some(node_ix)) = (doc.parent(node), doc.index_in_parent(node))
            else {
                return;
            };
            if point.node == grandparent && point.offset > node_ix + 1 {
                point.offset += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Attrs, NodeId, Tag};

    #[test]
    fn element_points_shift_with_siblings() {
        let mut doc = Document::new();
        let a = doc.create_element(Tag::Paragraph, Attrs::new());
        let b = doc.create_element(Tag::Paragraph, Attrs::new());
        doc.append_child(doc.root(), a).unwrap();
        doc.append_child(doc.root(), b).unwrap();

        let mut bookmark = Bookmark::capture(&Selection::new(
            Point::new(NodeId::ROOT, 0),
            Point::new(NodeId::ROOT, 2),
        ));
        bookmark.remap(
            &Op::Attach {
                node: b,
                parent: NodeId::ROOT,
                index: 1,
            },
            &doc,
        );
        let selection = bookmark.resolve(&doc);
        assert_eq!(selection.anchor, Point::new(NodeId::ROOT, 0));
        assert_eq!(selection.focus.offset, 2);
        assert_eq!(bookmark.focus, Point::new(NodeId::ROOT, 3));
    }

    #[test]
    fn points_inside_a_removed_subtree_collapse_to_its_slot() {
        let mut doc = Document::new();
        let p = doc.create_element(Tag::Paragraph, Attrs::new());
        let text = doc.create_text("foo");
        doc.append_child(doc.root(), p).unwrap();
        doc.append_child(p, text).unwrap();

        let mut bookmark = Bookmark::capture(&Selection::collapsed(Point::new(text, 2)));
        bookmark.remap(
            &Op::Remove {
                node: p,
                parent: Some(NodeId::ROOT),
                index: 0,
            },
            &doc,
        );
        assert_eq!(bookmark.anchor, Point::new(NodeId::ROOT, 0));
        assert_eq!(bookmark.focus, Point::new(NodeId::ROOT, 0));
    }
}
