use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Point, Selection};

pub type Attrs = BTreeMap<String, String>;

const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "source", "wbr",
];

/// Void elements that sit in the block flow rather than inside text.
const BLOCK_VOID_ELEMENTS: &[&str] = &["hr"];

/// Stable handle of a node inside a [`Document`] arena.
///
/// Handles are never reused: a removed node keeps its slot and is only
/// unlinked from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    fn from_index(ix: usize) -> Self {
        NodeId(ix as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tag {
    Paragraph,
    Heading(u8),
    Term,
    Value,
    ListItem,
    DescriptionList,
    OrderedList,
    UnorderedList,
    Blockquote,
    Div,
    Inline(String),
    Void(String),
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if let Some(level) = name
            .strip_prefix('h')
            .and_then(|level| level.parse::<u8>().ok())
            .filter(|level| (1..=6).contains(level))
        {
            return Tag::Heading(level);
        }

        match name.as_str() {
            "p" => Tag::Paragraph,
            "dt" => Tag::Term,
            "dd" => Tag::Value,
            "li" => Tag::ListItem,
            "dl" => Tag::DescriptionList,
            "ol" => Tag::OrderedList,
            "ul" => Tag::UnorderedList,
            "blockquote" => Tag::Blockquote,
            "div" => Tag::Div,
            _ if VOID_ELEMENTS.contains(&name.as_str()) => Tag::Void(name),
            _ => Tag::Inline(name),
        }
    }

    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Tag::Paragraph => Cow::Borrowed("p"),
            Tag::Heading(level) => Cow::Owned(format!("h{level}")),
            Tag::Term => Cow::Borrowed("dt"),
            Tag::Value => Cow::Borrowed("dd"),
            Tag::ListItem => Cow::Borrowed("li"),
            Tag::DescriptionList => Cow::Borrowed("dl"),
            Tag::OrderedList => Cow::Borrowed("ol"),
            Tag::UnorderedList => Cow::Borrowed("ul"),
            Tag::Blockquote => Cow::Borrowed("blockquote"),
            Tag::Div => Cow::Borrowed("div"),
            Tag::Inline(name) | Tag::Void(name) => Cow::Borrowed(name),
        }
    }

    pub fn role(&self) -> Option<BlockRole> {
        match self {
            Tag::Paragraph | Tag::Heading(_) => Some(BlockRole::Paragraph),
            Tag::Term => Some(BlockRole::Term),
            Tag::Value => Some(BlockRole::Value),
            Tag::ListItem => Some(BlockRole::ListItem),
            Tag::Blockquote | Tag::Div => Some(BlockRole::Flow),
            _ => None,
        }
    }

    pub fn item_role(&self) -> Option<ItemRole> {
        match self {
            Tag::Term => Some(ItemRole::Term),
            Tag::Value => Some(ItemRole::Value),
            _ => None,
        }
    }

    pub fn list_family(&self) -> Option<ListFamily> {
        match self {
            Tag::DescriptionList => Some(ListFamily::Description),
            Tag::OrderedList => Some(ListFamily::Ordered),
            Tag::UnorderedList => Some(ListFamily::Unordered),
            _ => None,
        }
    }

    pub fn is_list_item(&self) -> bool {
        matches!(self, Tag::Term | Tag::Value | Tag::ListItem)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Void(_))
    }

    pub fn is_inline(&self) -> bool {
        match self {
            Tag::Inline(_) => true,
            Tag::Void(name) => !BLOCK_VOID_ELEMENTS.contains(&name.as_str()),
            _ => false,
        }
    }

    pub fn is_block(&self) -> bool {
        !self.is_inline()
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag::from_name(&name)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.name().into_owned()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Kind of block an element is when it may hold inline content directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockRole {
    Paragraph,
    Term,
    Value,
    ListItem,
    /// Blockquote or div: a flow container that may also hold text.
    Flow,
}

impl BlockRole {
    pub fn is_item(self) -> bool {
        matches!(self, BlockRole::Term | BlockRole::Value | BlockRole::ListItem)
    }
}

/// The two roles an item of a description list can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    Term,
    Value,
}

impl ItemRole {
    pub fn opposite(self) -> Self {
        match self {
            ItemRole::Term => ItemRole::Value,
            ItemRole::Value => ItemRole::Term,
        }
    }

    pub fn tag(self) -> Tag {
        match self {
            ItemRole::Term => Tag::Term,
            ItemRole::Value => Tag::Value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFamily {
    Description,
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Element { tag: Tag, attrs: Attrs },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {0} has been removed")]
    Removed(NodeId),
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),
    #[error("node {0} is not attached to a parent")]
    Detached(NodeId),
    #[error("node {node} is not inside {ancestor}")]
    NotADescendant { node: NodeId, ancestor: NodeId },
    #[error("cannot move {node} into its own subtree")]
    Cycle { node: NodeId },
    #[error("the document root cannot be {0}")]
    RootImmutable(&'static str),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    removed: bool,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            removed: false,
        }
    }
}

/// Arena-backed block tree.
///
/// Every node lives in one slot addressed by its [`NodeId`]; parent and
/// child links are plain handles. Structural edits that must keep a
/// selection alive go through [`crate::TreeEdit`].
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Root)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.index()).filter(|data| !data.removed)
    }

    fn live(&self, id: NodeId) -> Result<&NodeData, TreeError> {
        match self.nodes.get(id.index()) {
            None => Err(TreeError::UnknownNode(id)),
            Some(data) if data.removed => Err(TreeError::Removed(id)),
            Some(data) => Ok(data),
        }
    }

    fn live_mut(&mut self, id: NodeId) -> Result<&mut NodeData, TreeError> {
        match self.nodes.get_mut(id.index()) {
            None => Err(TreeError::UnknownNode(id)),
            Some(data) if data.removed => Err(TreeError::Removed(id)),
            Some(data) => Ok(data),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.data(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.data(id).map(|data| &data.kind)
    }

    pub fn tag(&self, id: NodeId) -> Option<&Tag> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Root | NodeKind::Text(_) => None,
        }
    }

    pub fn attrs(&self, id: NodeId) -> Option<&Attrs> {
        match self.kind(id)? {
            NodeKind::Element { attrs, .. } => Some(attrs),
            NodeKind::Root | NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text),
            NodeKind::Root | NodeKind::Element { .. } => None,
        }
    }

    pub fn is_tag(&self, id: NodeId, tag: &Tag) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.index()).and_then(|data| data.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.data(id).map(|data| data.children.as_slice()).unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&node| self.parent(node))
    }

    pub fn ancestors_inclusive(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&node| self.parent(node))
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(id) && self.ancestors_inclusive(id).any(|node| node == NodeId::ROOT)
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|candidate| candidate == ancestor)
    }

    /// Nearest element at or above `id` whose tag satisfies `predicate`.
    pub fn find_ancestor(&self, id: NodeId, predicate: impl Fn(&Tag) -> bool) -> Option<NodeId> {
        self.ancestors_inclusive(id)
            .find(|&node| self.tag(node).is_some_and(&predicate))
    }

    /// Whitespace-only text carries no content at block level.
    pub fn is_ignorable(&self, id: NodeId) -> bool {
        self.text(id)
            .is_some_and(|text| text.chars().all(char::is_whitespace))
    }

    pub fn previous_significant_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let ix = self.index_in_parent(id)?;
        self.children(parent)[..ix]
            .iter()
            .rev()
            .copied()
            .find(|&node| !self.is_ignorable(node))
    }

    pub fn next_significant_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let ix = self.index_in_parent(id)?;
        self.children(parent)[ix + 1..]
            .iter()
            .copied()
            .find(|&node| !self.is_ignorable(node))
    }

    pub fn has_significant_children(&self, id: NodeId) -> bool {
        self.children(id).iter().any(|&child| !self.is_ignorable(child))
    }

    /// An element is empty when nothing below it is visible: no text with
    /// non-whitespace content and no void element such as an image.
    pub fn is_empty_block(&self, id: NodeId) -> bool {
        !self.descendants(id).into_iter().skip(1).any(|node| match self.kind(node) {
            Some(NodeKind::Text(text)) => !text.chars().all(char::is_whitespace),
            Some(NodeKind::Element { tag, .. }) => tag.is_void(),
            _ => false,
        })
    }

    /// Pre-order listing of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Child indices leading from the root to `id`, for attached nodes.
    pub fn index_path(&self, id: NodeId) -> Option<Vec<usize>> {
        if !self.is_attached(id) {
            return None;
        }
        let mut path = Vec::new();
        let mut node = id;
        while let Some(parent) = self.parent(node) {
            path.push(self.index_in_parent(node)?);
            node = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Sort key of a point in document order.
    ///
    /// Keys compare lexicographically; a key that is a prefix of another
    /// sorts first, which places "before child i" ahead of anything inside
    /// child i.
    pub fn point_key(&self, point: &Point) -> Option<Vec<usize>> {
        let mut key = self.index_path(point.node)?;
        key.push(point.offset);
        Some(key)
    }

    pub fn compare_points(&self, a: &Point, b: &Point) -> Option<Ordering> {
        Some(self.point_key(a)?.cmp(&self.point_key(b)?))
    }

    /// Selection boundaries as (start, end) in document order.
    pub fn ordered_points(&self, selection: &Selection) -> (Point, Point) {
        match self.compare_points(&selection.anchor, &selection.focus) {
            Some(Ordering::Greater) => (selection.focus.clone(), selection.anchor.clone()),
            _ => (selection.anchor.clone(), selection.focus.clone()),
        }
    }

    pub fn is_valid_point(&self, point: &Point) -> bool {
        if !self.is_attached(point.node) {
            return false;
        }
        match self.kind(point.node) {
            Some(NodeKind::Text(text)) => {
                point.offset <= text.len() && text.is_char_boundary(point.offset)
            }
            Some(NodeKind::Root | NodeKind::Element { .. }) => {
                point.offset <= self.children(point.node).len()
            }
            None => false,
        }
    }

    pub fn first_text_point(&self) -> Option<Point> {
        self.descendants(self.root())
            .into_iter()
            .find(|&node| self.text(node).is_some())
            .map(|node| Point::new(node, 0))
    }

    /// Nearest valid position to `point`.
    pub fn clamp_point(&self, point: &Point) -> Point {
        if self.is_valid_point(point) {
            return point.clone();
        }
        if self.is_attached(point.node) {
            let offset = match self.kind(point.node) {
                Some(NodeKind::Text(text)) => clamp_to_char_boundary(text, point.offset),
                _ => point.offset.min(self.children(point.node).len()),
            };
            return Point::new(point.node, offset);
        }
        self.first_text_point()
            .unwrap_or_else(|| Point::new(self.root(), 0))
    }

    pub fn create_element(&mut self, tag: Tag, attrs: Attrs) -> NodeId {
        self.push(NodeKind::Element { tag, attrs })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    /// Appends `child` to `parent` without tracking any selection; meant for
    /// assembling documents before they are handed to an editor.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.insert_raw(parent, usize::MAX, child)
    }

    pub(crate) fn detach_raw(&mut self, id: NodeId) -> Result<Option<(NodeId, usize)>, TreeError> {
        if id == NodeId::ROOT {
            return Err(TreeError::RootImmutable("detached"));
        }
        let Some(parent) = self.live(id)?.parent else {
            return Ok(None);
        };
        let ix = self
            .children(parent)
            .iter()
            .position(|&child| child == id)
            .ok_or(TreeError::Detached(id))?;
        self.live_mut(parent)?.children.remove(ix);
        self.live_mut(id)?.parent = None;
        Ok(Some((parent, ix)))
    }

    pub(crate) fn insert_raw(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), TreeError> {
        if child == NodeId::ROOT {
            return Err(TreeError::RootImmutable("inserted"));
        }
        if matches!(self.live(parent)?.kind, NodeKind::Text(_)) {
            return Err(TreeError::NotAnElement(parent));
        }
        if child == parent || self.is_ancestor_of(child, parent) {
            return Err(TreeError::Cycle { node: child });
        }
        if self.live(child)?.parent.is_some() {
            self.detach_raw(child)?;
        }
        let children = &mut self.live_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.live_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Moves every child of `from` into `to`, starting at `index`.
    pub(crate) fn move_children_raw(
        &mut self,
        from: NodeId,
        to: NodeId,
        index: usize,
    ) -> Result<usize, TreeError> {
        if from == to || self.is_ancestor_of(from, to) {
            return Err(TreeError::Cycle { node: from });
        }
        if matches!(self.live(to)?.kind, NodeKind::Text(_)) {
            return Err(TreeError::NotAnElement(to));
        }
        let moved = std::mem::take(&mut self.live_mut(from)?.children);
        for &child in &moved {
            self.live_mut(child)?.parent = Some(to);
        }
        let count = moved.len();
        let children = &mut self.live_mut(to)?.children;
        let index = index.min(children.len());
        children.splice(index..index, moved);
        Ok(count)
    }

    /// Moves the children of `node` from `at` onwards into `new_node`, which
    /// is placed right after `node`.
    pub(crate) fn split_raw(
        &mut self,
        node: NodeId,
        at: usize,
        new_node: NodeId,
    ) -> Result<(), TreeError> {
        let parent = self.live(node)?.parent.ok_or(TreeError::Detached(node))?;
        let node_ix = self
            .index_in_parent(node)
            .ok_or(TreeError::Detached(node))?;
        self.insert_raw(parent, node_ix + 1, new_node)?;

        let data = self.live_mut(node)?;
        let at = at.min(data.children.len());
        let moved = data.children.split_off(at);
        for &child in &moved {
            self.live_mut(child)?.parent = Some(new_node);
        }
        self.live_mut(new_node)?.children.extend(moved);
        Ok(())
    }

    pub(crate) fn set_tag(&mut self, id: NodeId, tag: Tag) -> Result<Tag, TreeError> {
        match &mut self.live_mut(id)?.kind {
            NodeKind::Element { tag: current, .. } => Ok(std::mem::replace(current, tag)),
            NodeKind::Root | NodeKind::Text(_) => Err(TreeError::NotAnElement(id)),
        }
    }

    pub(crate) fn mark_removed(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.live_mut(id)?.removed = true;
        Ok(())
    }

    pub(crate) fn element_parts(&self, id: NodeId) -> Result<(Tag, Attrs), TreeError> {
        match &self.live(id)?.kind {
            NodeKind::Element { tag, attrs } => Ok((tag.clone(), attrs.clone())),
            NodeKind::Root | NodeKind::Text(_) => Err(TreeError::NotAnElement(id)),
        }
    }
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let dl = doc.create_element(Tag::DescriptionList, Attrs::new());
        let dt = doc.create_element(Tag::Term, Attrs::new());
        let text = doc.create_text("foo");
        doc.append_child(doc.root(), dl).unwrap();
        doc.append_child(dl, dt).unwrap();
        doc.append_child(dt, text).unwrap();
        (doc, dl, dt, text)
    }

    #[test]
    fn tag_names_round_trip() {
        for name in ["p", "h3", "dt", "dd", "li", "dl", "ol", "ul", "blockquote", "div", "b", "img"] {
            assert_eq!(Tag::from_name(name).name(), name);
        }
        assert_eq!(Tag::from_name("H2"), Tag::Heading(2));
        assert_eq!(Tag::from_name("h7"), Tag::Inline("h7".to_string()));
        assert!(Tag::from_name("hr").is_block());
        assert!(Tag::from_name("br").is_inline());
    }

    #[test]
    fn index_paths_and_point_order() {
        let (doc, dl, dt, text) = sample();
        assert_eq!(doc.index_path(text), Some(vec![0, 0, 0]));

        let before_dt = Point::new(dl, 0);
        let inside = Point::new(text, 1);
        let after_dt = Point::new(dl, 1);
        assert_eq!(doc.compare_points(&before_dt, &inside), Some(Ordering::Less));
        assert_eq!(doc.compare_points(&after_dt, &inside), Some(Ordering::Greater));
        assert!(doc.is_ancestor_of(dl, text));
        assert!(!doc.is_ancestor_of(text, dt));
    }

    #[test]
    fn emptiness_ignores_whitespace_but_not_images() {
        let mut doc = Document::new();
        let p = doc.create_element(Tag::Paragraph, Attrs::new());
        let ws = doc.create_text("  \n");
        doc.append_child(doc.root(), p).unwrap();
        doc.append_child(p, ws).unwrap();
        assert!(doc.is_empty_block(p));

        let img = doc.create_element(Tag::from_name("img"), Attrs::new());
        doc.append_child(p, img).unwrap();
        assert!(!doc.is_empty_block(p));
    }

    #[test]
    fn inserting_a_node_into_itself_is_rejected() {
        let (mut doc, dl, _, text) = sample();
        assert_eq!(
            doc.append_child(text, dl),
            Err(TreeError::NotAnElement(text))
        );
        let dt = doc.children(dl)[0];
        assert_eq!(doc.append_child(dt, dl), Err(TreeError::Cycle { node: dl }));
    }
}
