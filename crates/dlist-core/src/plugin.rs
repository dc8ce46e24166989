use std::collections::HashMap;
use std::sync::Arc;

use log::trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::{ApplyError, Editor, EditorConfig};
use crate::description_list::DescriptionListPlugin;
use crate::document::{NodeId, Tag, TreeError};
use crate::edit::TreeEdit;

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<TreeError> for CommandError {
    fn from(err: TreeError) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Tri-state of a context-sensitive command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    On,
    Off,
    Disabled,
}

type RefreshFn = dyn Fn(&Editor) -> CommandState + Send + Sync;
type HandlerFn =
    dyn Fn(&mut Editor, CommandState, Option<Value>) -> Result<(), CommandError> + Send + Sync;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    /// Elements the command may introduce into a document.
    pub allowed_content: Vec<Tag>,
    pub refresh: Arc<RefreshFn>,
    pub handler: Arc<HandlerFn>,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, CommandState, Option<Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            allowed_content: Vec::new(),
            refresh: Arc::new(|_: &Editor| CommandState::Off),
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowed_content(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.allowed_content = tags.into_iter().collect();
        self
    }

    pub fn refresh(
        mut self,
        refresh: impl Fn(&Editor) -> CommandState + Send + Sync + 'static,
    ) -> Self {
        self.refresh = Arc::new(refresh);
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>,
}

/// Structural fix-up run after every edit until no pass reports a change.
pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, edit: &mut TreeEdit<'_>) -> Result<bool, TreeError>;
}

pub trait EditorPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate plugin id: {0}")]
    DuplicatePlugin(&'static str),
    #[error("duplicate command id: {0}")]
    DuplicateCommand(String),
    #[error("duplicate query id: {0}")]
    DuplicateQuery(String),
}

#[derive(Default)]
pub struct PluginRegistry {
    plugin_ids: Vec<&'static str>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(
        plugins: impl IntoIterator<Item = Box<dyn EditorPlugin>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    pub fn core() -> Self {
        let plugins: Vec<Box<dyn EditorPlugin>> = vec![Box::new(CoreNormalizePlugin)];
        Self::new(plugins).expect("core registry must be valid")
    }

    pub fn description_list(config: &EditorConfig) -> Self {
        let plugins: Vec<Box<dyn EditorPlugin>> = vec![
            Box::new(CoreNormalizePlugin),
            Box::new(DescriptionListPlugin::new(config)),
        ];
        Self::new(plugins).expect("description list registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn EditorPlugin>) -> Result<(), RegistryError> {
        if self.plugin_ids.contains(&plugin.id()) {
            return Err(RegistryError::DuplicatePlugin(plugin.id()));
        }

        let commands = plugin.commands();
        let queries = plugin.queries();
        for cmd in &commands {
            if self.commands.contains_key(&cmd.id) {
                return Err(RegistryError::DuplicateCommand(cmd.id.clone()));
            }
        }
        for query in &queries {
            if self.queries.contains_key(&query.id) {
                return Err(RegistryError::DuplicateQuery(query.id.clone()));
            }
        }

        self.plugin_ids.push(plugin.id());
        self.normalize_passes.extend(plugin.normalize_passes());
        self.commands
            .extend(commands.into_iter().map(|cmd| (cmd.id.clone(), cmd)));
        self.queries
            .extend(queries.into_iter().map(|query| (query.id.clone(), query)));
        Ok(())
    }

    pub fn plugin_ids(&self) -> &[&'static str] {
        &self.plugin_ids
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    /// Runs every pass until a full round changes nothing.
    pub fn normalize(&self, edit: &mut TreeEdit<'_>, max_iterations: usize) -> Result<(), ApplyError> {
        for _ in 0..max_iterations {
            let mut changed = false;
            for pass in &self.normalize_passes {
                if pass.run(edit)? {
                    trace!("normalize pass {} changed the document", pass.id());
                    changed = true;
                }
            }
            if !changed {
                return Ok(());
            }
        }
        Err(ApplyError::NormalizeDidNotConverge)
    }
}

struct CoreNormalizePlugin;

impl EditorPlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(WrapStrayInlineContent),
            Box::new(PruneEmptyDescriptionLists),
        ]
    }
}

/// Wraps inline content sitting directly in a flow container next to blocks
/// into paragraphs.
struct WrapStrayInlineContent;

impl WrapStrayInlineContent {
    fn is_inline(edit: &TreeEdit<'_>, node: NodeId) -> bool {
        let doc = edit.doc();
        doc.text(node).is_some() || doc.tag(node).is_some_and(Tag::is_inline)
    }

    fn needs_wrapping(edit: &TreeEdit<'_>, container: NodeId) -> bool {
        let doc = edit.doc();
        match doc.tag(container) {
            None => container == doc.root(),
            Some(Tag::Blockquote | Tag::Div) => doc
                .children(container)
                .iter()
                .any(|&child| !Self::is_inline(edit, child)),
            Some(_) => false,
        }
    }
}

impl NormalizePass for WrapStrayInlineContent {
    fn id(&self) -> &'static str {
        "core.wrap_stray_inline_content"
    }

    fn run(&self, edit: &mut TreeEdit<'_>) -> Result<bool, TreeError> {
        let root = edit.doc().root();
        let containers: Vec<NodeId> = edit
            .doc()
            .descendants(root)
            .into_iter()
            .filter(|&node| Self::needs_wrapping(edit, node))
            .collect();

        let mut runs: Vec<Vec<NodeId>> = Vec::new();
        for container in containers {
            let mut run: Vec<NodeId> = Vec::new();
            for &child in edit.doc().children(container) {
                if Self::is_inline(edit, child) {
                    run.push(child);
                } else if !run.is_empty() {
                    runs.push(std::mem::take(&mut run));
                }
            }
            if !run.is_empty() {
                runs.push(run);
            }
        }
        runs.retain(|run| run.iter().any(|&node| !edit.doc().is_ignorable(node)));

        for run in &runs {
            let paragraph = edit.create_element(Tag::Paragraph);
            edit.insert_before(paragraph, run[0])?;
            for &node in run {
                edit.append_to(paragraph, node)?;
            }
        }
        Ok(!runs.is_empty())
    }
}

struct PruneEmptyDescriptionLists;

impl NormalizePass for PruneEmptyDescriptionLists {
    fn id(&self) -> &'static str {
        "core.prune_empty_description_lists"
    }

    fn run(&self, edit: &mut TreeEdit<'_>) -> Result<bool, TreeError> {
        let doc = edit.doc();
        let empty: Vec<NodeId> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|&node| {
                doc.is_tag(node, &Tag::DescriptionList) && !doc.has_significant_children(node)
            })
            .collect();
        for &dl in empty.iter().rev() {
            if edit.doc().is_attached(dl) {
                edit.remove(dl)?;
            }
        }
        Ok(!empty.is_empty())
    }
}
