use std::collections::HashMap;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::{Document, NodeId, TreeError};
use crate::edit::TreeEdit;
use crate::markup::{self, MarkupError};
use crate::ops::Transaction;
use crate::plugin::{CommandError, CommandSpec, CommandState, PluginRegistry, QueryError};

/// A position in the tree: a byte offset for text nodes, a child index for
/// elements and the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub node: NodeId,
    pub offset: usize,
}

impl Point {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_normalize_iterations: usize,
    /// Editors without block structure get no description list commands.
    pub blockless: bool,
    /// Fold a freshly built list into a description list that follows it.
    pub merge_following: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_normalize_iterations: 0,
            blockless: false,
            merge_following: true,
        }
        .with_defaults()
    }
}

impl EditorConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::with_defaults)
    }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
    #[error(transparent)]
    Tree(#[from] TreeError),
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    registry: PluginRegistry,
    config: EditorConfig,
    last_transaction: Option<Transaction>,
}

impl Editor {
    pub fn new(doc: Document, selection: Option<Selection>, registry: PluginRegistry) -> Self {
        Self::with_registry_and_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(doc: Document, selection: Option<Selection>, config: EditorConfig) -> Self {
        let config = config.with_defaults();
        let registry = PluginRegistry::description_list(&config);
        Self::with_registry_and_config(doc, selection, registry, config)
    }

    fn with_registry_and_config(
        doc: Document,
        selection: Option<Selection>,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let selection = selection.unwrap_or_else(|| {
            Selection::collapsed(
                doc.first_text_point()
                    .unwrap_or_else(|| Point::new(doc.root(), 0)),
            )
        });
        let mut editor = Self {
            doc,
            selection,
            registry,
            config,
            last_transaction: None,
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_description_list_plugins() -> Self {
        Self::with_config(Document::new(), None, EditorConfig::default())
    }

    /// Loads markup such as `<dl><dt>[]foo</dt></dl>`, where `[` and `]`
    /// mark the selection start and end.
    pub fn from_markup(source: &str) -> Result<Self, MarkupError> {
        Self::from_markup_with_config(source, EditorConfig::default())
    }

    pub fn from_markup_with_config(source: &str, config: EditorConfig) -> Result<Self, MarkupError> {
        let (doc, selection) = markup::parse(source)?;
        Ok(Self::with_config(doc, selection, config))
    }

    pub fn to_markup(&self) -> String {
        markup::to_markup(&self.doc, Some(&self.selection))
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Selection {
            anchor: self.doc.clamp_point(&selection.anchor),
            focus: self.doc.clamp_point(&selection.focus),
        };
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Ops and resulting selection of the last successful edit.
    pub fn last_transaction(&self) -> Option<&Transaction> {
        self.last_transaction.as_ref()
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        self.registry.commands()
    }

    pub fn command_state(&self, id: &str) -> Option<CommandState> {
        let command = self.registry.command(id)?;
        Some((command.refresh)(self))
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        let state = (command.refresh)(self);
        if state == CommandState::Disabled {
            return Err(CommandError::new(format!("Command {id} is disabled")));
        }
        debug!("running command {id} ({state:?})");
        (command.handler)(self, state, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    /// Runs `edit` against a staged copy of the document.
    ///
    /// The copy, the remapped selection and the op journal replace the live
    /// state only when `edit` and the normalize passes succeed; on error the
    /// editor is left exactly as it was.
    pub fn stage<F, E>(&mut self, source: &str, edit: F) -> Result<(), CommandError>
    where
        F: FnOnce(&mut TreeEdit<'_>, &Selection) -> Result<(), E>,
        CommandError: From<E>,
    {
        let mut doc = self.doc.clone();
        let selection = self.selection.clone();

        let (selection_after, ops) = {
            let mut tree_edit = TreeEdit::new(&mut doc, &selection);
            edit(&mut tree_edit, &selection)?;
            self.registry
                .normalize(&mut tree_edit, self.config.max_normalize_iterations)
                .map_err(|err| CommandError::new(format!("{source}: {err}")))?;
            tree_edit.finish()
        };

        debug!("{source}: committed {} ops", ops.len());
        self.doc = doc;
        self.selection = selection_after.clone();
        self.last_transaction = Some(
            Transaction::new(ops)
                .selection_after(selection_after)
                .source(source),
        );
        Ok(())
    }

    fn normalize_in_place(&mut self) {
        let mut doc = self.doc.clone();
        let result = {
            let mut tree_edit = TreeEdit::new(&mut doc, &self.selection);
            self.registry
                .normalize(&mut tree_edit, self.config.max_normalize_iterations)
                .map(|()| tree_edit.finish())
        };
        match result {
            Ok((selection, _)) => {
                self.doc = doc;
                self.selection = selection;
            }
            Err(err) => warn!("initial normalization skipped: {err}"),
        }
    }
}
