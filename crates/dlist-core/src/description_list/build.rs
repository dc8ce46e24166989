use log::debug;

use super::ListError;
use super::collect::{block_at, collect_blocks};
use crate::core::Selection;
use crate::document::{Document, ItemRole, NodeId, Tag, TreeError};
use crate::edit::{Placement, TreeEdit};

/// Converts the blocks touched by `selection` into description lists, one
/// per run of blocks sharing a flow container.
///
/// Returns the lists that received the blocks.
pub fn build_list(
    edit: &mut TreeEdit<'_>,
    selection: &Selection,
    merge_following: bool,
) -> Result<Vec<NodeId>, ListError> {
    let doc = edit.doc();
    let blocks = collect_blocks(doc, selection);
    if blocks.is_empty() {
        debug!("no blocks to convert into a description list");
        return Ok(Vec::new());
    }

    let (start, _) = doc.ordered_points(selection);
    let start_block = block_at(doc, &start);
    let runs = group_runs(doc, &blocks);

    let mut lists = Vec::with_capacity(runs.len());
    for (ix, run) in runs.iter().enumerate() {
        let lead = match start_block {
            Some(block) if ix == 0 => block,
            _ => run[0],
        };
        lists.push(build_run(edit, lead, run, merge_following)?);
    }
    Ok(lists)
}

/// Nearest ancestor that is neither a list nor a list item.
fn flow_container(doc: &Document, node: NodeId) -> NodeId {
    doc.ancestors(node)
        .find(|&ancestor| {
            doc.tag(ancestor)
                .is_none_or(|tag| tag.list_family().is_none() && !tag.is_list_item())
        })
        .unwrap_or(doc.root())
}

fn group_runs(doc: &Document, blocks: &[NodeId]) -> Vec<Vec<NodeId>> {
    let mut runs: Vec<Vec<NodeId>> = Vec::new();
    let mut current_flow = None;
    for &block in blocks {
        let flow = flow_container(doc, block);
        match runs.last_mut() {
            Some(run) if current_flow == Some(flow) => run.push(block),
            _ => runs.push(vec![block]),
        }
        current_flow = Some(flow);
    }
    runs
}

/// The list directly wrapping a block: its parent when the block is a list
/// item, its grandparent when the block sits inside one.
fn wrapping_list(doc: &Document, block: NodeId) -> Option<NodeId> {
    let parent = doc.parent(block)?;
    let list = if doc.tag(block).is_some_and(Tag::is_list_item) {
        parent
    } else if doc.tag(parent).is_some_and(Tag::is_list_item) {
        doc.parent(parent)?
    } else {
        return None;
    };
    doc.tag(list)
        .and_then(Tag::list_family)
        .map(|_| list)
}

fn preceding_description_list(doc: &Document, node: NodeId) -> Option<NodeId> {
    doc.previous_significant_sibling(node)
        .filter(|&prev| doc.is_tag(prev, &Tag::DescriptionList))
}

/// Role the next item appended to `dl` should take.
fn continuing_role(doc: &Document, dl: NodeId) -> ItemRole {
    doc.children(dl)
        .iter()
        .rev()
        .find_map(|&child| doc.tag(child).and_then(Tag::item_role))
        .map(ItemRole::opposite)
        .unwrap_or(ItemRole::Term)
}

fn build_run(
    edit: &mut TreeEdit<'_>,
    lead: NodeId,
    run: &[NodeId],
    merge_following: bool,
) -> Result<NodeId, ListError> {
    let (dl, mut role) = match preceding_description_list(edit.doc(), lead) {
        Some(dl) => (dl, continuing_role(edit.doc(), dl)),
        None => {
            let created = create_list_container(edit, run[0])?;
            match preceding_description_list(edit.doc(), created) {
                Some(dl) => {
                    edit.remove(created)?;
                    (dl, continuing_role(edit.doc(), dl))
                }
                None => (created, ItemRole::Term),
            }
        }
    };

    let last_block_parent = match run {
        [_, .., last] => edit.doc().parent(*last),
        _ => None,
    };

    let mut lists_to_check = Vec::new();
    for &block in run {
        if let Some(list) = wrapping_list(edit.doc(), block) {
            lists_to_check.push(list);
        }
        role = move_block(edit, dl, block, role)?;
    }

    for list in lists_to_check {
        let doc = edit.doc();
        if doc.is_attached(list) && doc.is_empty_block(list) {
            edit.remove(list)?;
        }
    }

    if let Some(parent) = last_block_parent {
        let doc = edit.doc();
        if doc.is_attached(parent)
            && doc.is_tag(parent, &Tag::ListItem)
            && doc.is_empty_block(parent)
        {
            edit.remove(parent)?;
        }
    }

    let following = if merge_following {
        let doc = edit.doc();
        doc.next_significant_sibling(dl)
            .filter(|&next| doc.is_tag(next, &Tag::DescriptionList))
    } else {
        None
    };
    let Some(next) = following else {
        return Ok(dl);
    };

    edit.move_children(dl, next, Placement::Prepend)?;
    edit.remove(dl)?;
    debug!("merged description list {dl} into {next}");
    Ok(next)
}

/// Creates an empty description list where `block` sits, splitting the
/// list wrapping it when there is one, and detaches `block`.
fn create_list_container(edit: &mut TreeEdit<'_>, block: NodeId) -> Result<NodeId, TreeError> {
    let doc = edit.doc();
    let block_parent = doc.parent(block).ok_or(TreeError::Detached(block))?;
    let block_is_item = doc.is_tag(block, &Tag::ListItem);
    let list = wrapping_list(doc, block);

    let dl = edit.create_element(Tag::DescriptionList);
    let second_list = match list {
        Some(list) => Some(edit.split_element_before(list, block)?),
        None => None,
    };
    edit.insert_before(dl, second_list.unwrap_or(block))?;
    edit.detach(block)?;

    if let Some(list) = list {
        let doc = edit.doc();
        if doc.is_empty_block(list) {
            edit.remove(list)?;
        } else if !block_is_item && doc.is_attached(block_parent) && doc.is_empty_block(block_parent)
        {
            edit.remove(block_parent)?;
        }
    }

    if let Some(second_list) = second_list {
        let doc = edit.doc();
        if doc.is_empty_block(second_list) {
            edit.remove(second_list)?;
        } else if !block_is_item {
            let first_item = doc
                .children(second_list)
                .iter()
                .copied()
                .find(|&child| doc.is_tag(child, &Tag::ListItem))
                .filter(|&item| doc.is_empty_block(item));
            if let Some(item) = first_item {
                edit.remove(item)?;
            }
        }
    }

    Ok(dl)
}

/// Appends `block` to `dl` as an item and returns the role of the next one.
fn move_block(
    edit: &mut TreeEdit<'_>,
    dl: NodeId,
    block: NodeId,
    role: ItemRole,
) -> Result<ItemRole, TreeError> {
    if let Some(existing) = edit.doc().tag(block).and_then(Tag::item_role) {
        edit.append_to(dl, block)?;
        return Ok(existing.opposite());
    }

    let item = edit.create_element(role.tag());
    edit.move_children(block, item, Placement::Append)?;
    edit.append_to(dl, item)?;
    edit.remove(block)?;
    Ok(role.opposite())
}
