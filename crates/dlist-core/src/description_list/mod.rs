//! Description list (`dl` / `dt` / `dd`) editing: building lists out of
//! selected blocks, turning them back into paragraphs and switching items
//! between terms and values.

mod build;
mod collect;
mod remove;
mod toggle;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use build::build_list;
pub use collect::{block_at, collect_blocks, is_text_block};
pub use remove::remove_list;
pub use toggle::toggle_roles;

use crate::core::{Editor, EditorConfig, Selection};
use crate::document::{Document, ItemRole, Tag, TreeError};
use crate::plugin::{CommandError, CommandSpec, CommandState, EditorPlugin, QueryError, QuerySpec};

pub const TOGGLE_LIST_COMMAND: &str = "description_list.toggle";
pub const TOGGLE_TERM_COMMAND: &str = "description_list.term";
pub const TOGGLE_VALUE_COMMAND: &str = "description_list.value";

pub const STATE_QUERY: &str = "description_list.state";
pub const IS_ACTIVE_QUERY: &str = "description_list.is_active";
pub const ACTIVE_ROLE_QUERY: &str = "description_list.active_role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Start,
    End,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Start => f.write_str("start"),
            Boundary::End => f.write_str("end"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("selection does not cover any term or value of a description list")]
    NotInDescriptionList,
    #[error("selection {0} is not inside a term or value")]
    NoItemAncestor(Boundary),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl From<ListError> for CommandError {
    fn from(err: ListError) -> Self {
        CommandError::new(err.to_string())
    }
}

/// States of the three description list commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionListState {
    pub toggle: CommandState,
    pub term: CommandState,
    pub value: CommandState,
}

impl DescriptionListState {
    pub fn of(doc: &Document, selection: &Selection) -> Self {
        Self {
            toggle: list_state(doc, selection),
            term: item_state(doc, selection, ItemRole::Term),
            value: item_state(doc, selection, ItemRole::Value),
        }
    }
}

/// On when the nearest list around the selection start is a description
/// list.
pub fn list_state(doc: &Document, selection: &Selection) -> CommandState {
    let (start, _) = doc.ordered_points(selection);
    match doc.find_ancestor(start.node, |tag| tag.list_family().is_some()) {
        Some(list) if doc.is_tag(list, &Tag::DescriptionList) => CommandState::On,
        _ => CommandState::Off,
    }
}

/// Looks for the nearest `dl` or item of `role` around the selection start:
/// none disables the command, the item turns it on, the list leaves it off.
pub fn item_state(doc: &Document, selection: &Selection, role: ItemRole) -> CommandState {
    let (start, _) = doc.ordered_points(selection);
    let role_tag = role.tag();
    let found = doc.find_ancestor(start.node, |tag| {
        *tag == Tag::DescriptionList || *tag == role_tag
    });
    match found {
        None => CommandState::Disabled,
        Some(node) if doc.is_tag(node, &Tag::DescriptionList) => CommandState::Off,
        Some(_) => CommandState::On,
    }
}

pub fn active_role(doc: &Document, selection: &Selection) -> Option<ItemRole> {
    let (start, _) = doc.ordered_points(selection);
    doc.find_ancestor(start.node, |tag| tag.item_role().is_some())
        .and_then(|item| doc.tag(item))
        .and_then(Tag::item_role)
}

pub struct DescriptionListPlugin {
    merge_following: bool,
    blockless: bool,
}

impl DescriptionListPlugin {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            merge_following: config.merge_following,
            blockless: config.blockless,
        }
    }
}

fn toggle_item_command(id: &'static str, label: &str, role: ItemRole) -> CommandSpec {
    CommandSpec::new(id, label, move |editor, state, _args| {
        let target = match state {
            CommandState::On => role.opposite(),
            CommandState::Off | CommandState::Disabled => role,
        };
        editor.stage(id, |edit, selection| {
            toggle_roles(edit, selection, target).map(drop)
        })
    })
    .refresh(move |editor| item_state(editor.doc(), editor.selection(), role))
}

impl EditorPlugin for DescriptionListPlugin {
    fn id(&self) -> &'static str {
        "description_list"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        if self.blockless {
            return Vec::new();
        }
        let merge_following = self.merge_following;

        vec![
            CommandSpec::new(
                TOGGLE_LIST_COMMAND,
                "Description list",
                move |editor, state, _args| {
                    editor.stage(TOGGLE_LIST_COMMAND, |edit, selection| match state {
                        CommandState::On => remove_list(edit, selection).map(drop),
                        CommandState::Off | CommandState::Disabled => {
                            build_list(edit, selection, merge_following).map(drop)
                        }
                    })
                },
            )
            .description("Turn the selected blocks into a description list, or back into paragraphs.")
            .keywords(["description", "definition", "list", "dl"])
            .allowed_content([Tag::DescriptionList, Tag::Term, Tag::Value])
            .refresh(|editor| list_state(editor.doc(), editor.selection())),
            toggle_item_command(TOGGLE_TERM_COMMAND, "Description term", ItemRole::Term)
                .description("Turn the selected description list items into terms.")
                .keywords(["description", "term", "dt"]),
            toggle_item_command(TOGGLE_VALUE_COMMAND, "Description value", ItemRole::Value)
                .description("Turn the selected description list items into values.")
                .keywords(["description", "value", "dd"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        if self.blockless {
            return Vec::new();
        }
        vec![
            QuerySpec {
                id: STATE_QUERY.to_string(),
                handler: Arc::new(|editor: &Editor, _args: Option<Value>| {
                    serde_json::to_value(state_of(editor))
                        .map_err(|err| QueryError::new(format!("Failed to encode state: {err}")))
                }),
            },
            QuerySpec {
                id: IS_ACTIVE_QUERY.to_string(),
                handler: Arc::new(|editor: &Editor, _args: Option<Value>| -> Result<Value, QueryError> {
                    Ok(Value::Bool(
                        list_state(editor.doc(), editor.selection()) == CommandState::On,
                    ))
                }),
            },
            QuerySpec {
                id: ACTIVE_ROLE_QUERY.to_string(),
                handler: Arc::new(|editor: &Editor, _args: Option<Value>| {
                    serde_json::to_value(active_role(editor.doc(), editor.selection()))
                        .map_err(|err| QueryError::new(format!("Failed to encode role: {err}")))
                }),
            },
        ]
    }
}

fn state_of(editor: &Editor) -> DescriptionListState {
    DescriptionListState::of(editor.doc(), editor.selection())
}
