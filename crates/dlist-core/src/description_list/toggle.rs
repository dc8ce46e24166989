use log::debug;

use super::{Boundary, ListError};
use crate::core::{Point, Selection};
use crate::document::{Document, ItemRole, NodeId, Tag};
use crate::edit::TreeEdit;

fn enclosing_item(doc: &Document, point: &Point) -> Option<NodeId> {
    doc.find_ancestor(point.node, |tag| tag.item_role().is_some())
}

/// Renames every item of the opposite role between the item holding the
/// selection start and the one holding its end to `target`.
///
/// Returns how many items changed.
pub fn toggle_roles(
    edit: &mut TreeEdit<'_>,
    selection: &Selection,
    target: ItemRole,
) -> Result<usize, ListError> {
    let doc = edit.doc();
    let (start, end) = doc.ordered_points(selection);
    let first = enclosing_item(doc, &start).ok_or(ListError::NoItemAncestor(Boundary::Start))?;
    let last = enclosing_item(doc, &end).ok_or(ListError::NoItemAncestor(Boundary::End))?;

    let order = doc.descendants(doc.root());
    let position = |node| order.iter().position(|&candidate| candidate == node);
    let (Some(a), Some(b)) = (position(first), position(last)) else {
        return Ok(0);
    };
    let (from, to) = (a.min(b), a.max(b));

    let opposite = target.opposite();
    let to_toggle: Vec<NodeId> = order[from..=to]
        .iter()
        .copied()
        .filter(|&node| doc.tag(node).and_then(Tag::item_role) == Some(opposite))
        .collect();

    for &node in to_toggle.iter().rev() {
        edit.rename(node, target.tag())?;
    }
    debug!("toggled {} items to {}", to_toggle.len(), target.tag());
    Ok(to_toggle.len())
}
