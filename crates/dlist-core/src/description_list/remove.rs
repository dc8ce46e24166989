use log::debug;

use super::ListError;
use super::collect::collect_blocks;
use crate::core::Selection;
use crate::document::{NodeId, Tag, TreeError};
use crate::edit::TreeEdit;

/// Turns the selected terms and values back into paragraphs, splitting
/// their lists around them and dropping the halves left without children.
///
/// Returns the demoted elements, now paragraphs.
pub fn remove_list(
    edit: &mut TreeEdit<'_>,
    selection: &Selection,
) -> Result<Vec<NodeId>, ListError> {
    let doc = edit.doc();
    let items: Vec<NodeId> = collect_blocks(doc, selection)
        .into_iter()
        .filter(|&block| {
            doc.tag(block).and_then(Tag::item_role).is_some()
                && doc
                    .parent(block)
                    .is_some_and(|parent| doc.is_tag(parent, &Tag::DescriptionList))
        })
        .collect();
    let Some((&first, rest)) = items.split_first() else {
        return Err(ListError::NotInDescriptionList);
    };

    let first_list = doc.parent(first).ok_or(TreeError::Detached(first))?;
    let mut current = edit.split_before(first)?;
    let mut halves = vec![first_list, current];
    demote(edit, first, current)?;

    for &item in rest {
        let parent = edit.doc().parent(item).ok_or(TreeError::Detached(item))?;
        if parent != current {
            current = edit.split_before(item)?;
            halves.push(parent);
            halves.push(current);
        }
        demote(edit, item, current)?;
    }

    while let Some(half) = halves.pop() {
        let doc = edit.doc();
        if doc.is_attached(half) && !doc.has_significant_children(half) {
            edit.remove(half)?;
        }
    }

    debug!("demoted {} description list items", items.len());
    Ok(items)
}

fn demote(edit: &mut TreeEdit<'_>, item: NodeId, before: NodeId) -> Result<(), TreeError> {
    edit.rename(item, Tag::Paragraph)?;
    edit.insert_before(item, before)
}
