use crate::core::{Point, Selection};
use crate::document::{Document, NodeId};

/// Whether `node` is a text block: a block element holding inline content
/// and no nested blocks, or a list item whose leading inline run is
/// significant even though blocks follow it.
pub fn is_text_block(doc: &Document, node: NodeId) -> bool {
    content_len(doc, node).is_some()
}

/// Number of leading children that make up the content of a text block.
fn content_len(doc: &Document, node: NodeId) -> Option<usize> {
    let role = doc.tag(node)?.role()?;
    let children = doc.children(node);
    let first_block = children.iter().position(|&child| {
        doc.tag(child).is_some_and(|child_tag| child_tag.is_block())
    });
    match first_block {
        None => Some(children.len()),
        Some(ix) if role.is_item()
            && children[..ix].iter().any(|&child| !doc.is_ignorable(child)) =>
        {
            Some(ix)
        }
        Some(_) => None,
    }
}

/// Text blocks touched by `selection`, in document order.
///
/// A block counts as touched when the selection range overlaps the span
/// from before its first content child to after its last one, so a
/// collapsed point inside a block yields that block and a collapsed point
/// between blocks yields nothing.
pub fn collect_blocks(doc: &Document, selection: &Selection) -> Vec<NodeId> {
    let (start, end) = doc.ordered_points(selection);
    let (Some(start_key), Some(end_key)) = (doc.point_key(&start), doc.point_key(&end)) else {
        return Vec::new();
    };

    doc.descendants(doc.root())
        .into_iter()
        .filter(|&node| {
            let Some(len) = content_len(doc, node) else {
                return false;
            };
            let Some(path) = doc.index_path(node) else {
                return false;
            };
            let mut span_start = path.clone();
            span_start.push(0);
            let mut span_end = path;
            span_end.push(len);
            start_key <= span_end && end_key >= span_start
        })
        .collect()
}

/// Innermost text block containing `point`.
pub fn block_at(doc: &Document, point: &Point) -> Option<NodeId> {
    doc.ancestors_inclusive(point.node)
        .find(|&node| is_text_block(doc, node))
}
