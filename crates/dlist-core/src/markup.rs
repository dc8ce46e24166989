//! Compact HTML-like notation for documents and selections.
//!
//! `[` marks where the selection starts and `]` where it ends. A marker
//! touching text addresses a byte offset in that text; any other marker
//! addresses a child position of the enclosing element. Literal brackets in
//! text are written as `&#91;` and `&#93;`.
//!
//! Parsing drives the html5ever tokenizer without its tree builder, so
//! fixtures keep exactly the nesting they are written with.

use std::fmt::Write as _;

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Tag as HtmlTag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer,
    TokenizerOpts,
};
use thiserror::Error;

use crate::core::{Point, Selection};
use crate::document::{Attrs, Document, NodeId, NodeKind, Tag};

const START_MARKER: char = '[';
const END_MARKER: char = ']';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("malformed markup: {0}")]
    Syntax(String),
    #[error("closing </{found}> does not match open <{expected}>")]
    MismatchedClose { expected: String, found: String },
    #[error("closing </{0}> without an open element")]
    UnexpectedClose(String),
    #[error("<{0}> is never closed")]
    Unclosed(String),
    #[error("selection marker `{0}` appears more than once")]
    DuplicateMarker(char),
    #[error("selection marker `{0}` has no partner")]
    MissingMarker(char),
}

#[derive(Default)]
struct Markers {
    start: Option<Point>,
    end: Option<Point>,
}

impl Markers {
    fn set(&mut self, marker: char, point: Point) -> Result<(), MarkupError> {
        let slot = if marker == START_MARKER {
            &mut self.start
        } else {
            &mut self.end
        };
        if slot.is_some() {
            return Err(MarkupError::DuplicateMarker(marker));
        }
        *slot = Some(point);
        Ok(())
    }

    fn into_selection(self) -> Result<Option<Selection>, MarkupError> {
        match (self.start, self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => Ok(Some(Selection::new(start, end))),
            (Some(_), None) => Err(MarkupError::MissingMarker(END_MARKER)),
            (None, Some(_)) => Err(MarkupError::MissingMarker(START_MARKER)),
        }
    }
}

/// Decoded text between two tags, with the markers found inside it.
#[derive(Default)]
struct PendingText {
    text: String,
    /// Marker and its byte offset into `text`.
    markers: Vec<(char, usize)>,
}

impl PendingText {
    fn push(&mut self, chars: &str) {
        for ch in chars.chars() {
            match ch {
                START_MARKER | END_MARKER => self.markers.push((ch, self.text.len())),
                _ => self.text.push(restore_bracket(ch)),
            }
        }
    }

    fn flush(
        &mut self,
        doc: &mut Document,
        parent: NodeId,
        markers: &mut Markers,
    ) -> Result<(), MarkupError> {
        let pending = std::mem::take(self);
        if pending.text.is_empty() {
            let index = doc.children(parent).len();
            for (marker, _) in pending.markers {
                markers.set(marker, Point::new(parent, index))?;
            }
            return Ok(());
        }

        let node = doc.create_text(pending.text);
        // Parents on the open stack are always elements or the root.
        if doc.append_child(parent, node).is_err() {
            return Ok(());
        }
        for (marker, offset) in pending.markers {
            markers.set(marker, Point::new(node, offset))?;
        }
        Ok(())
    }
}

/// Builds the document straight from tokens. Fixtures are taken as written:
/// no implied elements and no reparenting.
struct FixtureSink {
    doc: Document,
    markers: Markers,
    stack: Vec<(NodeId, String)>,
    pending: PendingText,
    error: Option<MarkupError>,
}

impl FixtureSink {
    fn new() -> Self {
        Self {
            doc: Document::new(),
            markers: Markers::default(),
            stack: Vec::new(),
            pending: PendingText::default(),
            error: None,
        }
    }

    fn current(&self) -> NodeId {
        self.stack
            .last()
            .map(|(id, _)| *id)
            .unwrap_or(self.doc.root())
    }

    fn flush_text(&mut self) -> Result<(), MarkupError> {
        let parent = self.current();
        self.pending.flush(&mut self.doc, parent, &mut self.markers)
    }

    fn tag(&mut self, tag: HtmlTag) -> Result<(), MarkupError> {
        self.flush_text()?;
        let name = tag.name.to_string();
        let element = Tag::from_name(&name);

        if tag.kind == TagKind::EndTag {
            if element.is_void() {
                return Ok(());
            }
            return match self.stack.pop() {
                Some((_, open)) if open == name => Ok(()),
                Some((_, open)) => Err(MarkupError::MismatchedClose {
                    expected: open,
                    found: name,
                }),
                None => Err(MarkupError::UnexpectedClose(name)),
            };
        }

        let attrs: Attrs = tag
            .attrs
            .iter()
            .map(|attr| {
                let value = attr.value.chars().map(restore_bracket).collect();
                (attr.name.local.to_string(), value)
            })
            .collect();
        let opens = !tag.self_closing && !element.is_void();
        let node = self.doc.create_element(element, attrs);
        let parent = self.current();
        if self.doc.append_child(parent, node).is_ok() && opens {
            self.stack.push((node, name));
        }
        Ok(())
    }

    fn process(&mut self, token: Token) -> Result<(), MarkupError> {
        match token {
            Token::TagToken(tag) => self.tag(tag),
            Token::CharacterTokens(chars) => {
                self.pending.push(&chars);
                Ok(())
            }
            Token::ParseError(message) => Err(MarkupError::Syntax(message.into_owned())),
            Token::NullCharacterToken
            | Token::CommentToken(_)
            | Token::DoctypeToken(_)
            | Token::EOFToken => Ok(()),
        }
    }

    fn finish(mut self) -> Result<(Document, Option<Selection>), MarkupError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.flush_text()?;
        if let Some((_, name)) = self.stack.pop() {
            return Err(MarkupError::Unclosed(name));
        }
        Ok((self.doc, self.markers.into_selection()?))
    }
}

impl TokenSink for FixtureSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        if self.error.is_none() {
            if let Err(err) = self.process(token) {
                self.error = Some(err);
            }
        }
        TokenSinkResult::Continue
    }
}

/// Escaped brackets are swapped for private-use stand-ins before
/// tokenizing so that decoded text never contains a bare marker.
const ESCAPED_BRACKETS: [(&str, char, char); 2] = [
    ("&#91;", '\u{E05B}', START_MARKER),
    ("&#93;", '\u{E05D}', END_MARKER),
];

fn restore_bracket(ch: char) -> char {
    ESCAPED_BRACKETS
        .iter()
        .find(|(_, stand_in, _)| *stand_in == ch)
        .map_or(ch, |(_, _, bracket)| *bracket)
}

/// Parses `source` into a document plus the selection its markers describe.
pub fn parse(source: &str) -> Result<(Document, Option<Selection>), MarkupError> {
    let source = ESCAPED_BRACKETS
        .iter()
        .fold(source.to_string(), |source, (escape, stand_in, _)| {
            source.replace(*escape, &stand_in.to_string())
        });

    let mut input = BufferQueue::default();
    input.push_back(StrTendril::from(source));
    let mut tokenizer = Tokenizer::new(FixtureSink::new(), TokenizerOpts::default());
    let _ = tokenizer.feed(&mut input);
    tokenizer.end();
    tokenizer.sink.finish()
}

/// Serializes `doc`, drawing the selection markers when one is given.
pub fn to_markup(doc: &Document, selection: Option<&Selection>) -> String {
    let bounds = selection.map(|selection| doc.ordered_points(selection));
    let mut out = String::new();
    write_children(doc, doc.root(), bounds.as_ref(), &mut out);
    out
}

fn markers_at(bounds: Option<&(Point, Point)>, node: NodeId, offset: usize, out: &mut String) {
    let Some((start, end)) = bounds else {
        return;
    };
    if start.node == node && start.offset == offset {
        out.push(START_MARKER);
    }
    if end.node == node && end.offset == offset {
        out.push(END_MARKER);
    }
}

fn write_children(
    doc: &Document,
    parent: NodeId,
    bounds: Option<&(Point, Point)>,
    out: &mut String,
) {
    let children = doc.children(parent);
    for (ix, &child) in children.iter().enumerate() {
        markers_at(bounds, parent, ix, out);
        write_node(doc, child, bounds, out);
    }
    markers_at(bounds, parent, children.len(), out);
}

fn write_node(doc: &Document, node: NodeId, bounds: Option<&(Point, Point)>, out: &mut String) {
    match doc.kind(node) {
        Some(NodeKind::Text(text)) => write_text(text, node, bounds, out),
        Some(NodeKind::Element { tag, attrs }) => {
            let name = tag.name();
            out.push('<');
            out.push_str(&name);
            for (key, value) in attrs {
                let _ = write!(
                    out,
                    " {key}=\"{}\"",
                    html_escape::encode_double_quoted_attribute(value)
                );
            }
            out.push('>');
            if tag.is_void() {
                return;
            }
            write_children(doc, node, bounds, out);
            let _ = write!(out, "</{name}>");
        }
        Some(NodeKind::Root) | None => {}
    }
}

fn write_text(text: &str, node: NodeId, bounds: Option<&(Point, Point)>, out: &mut String) {
    let mut cuts: Vec<usize> = bounds
        .into_iter()
        .flat_map(|(start, end)| [start, end])
        .filter(|point| point.node == node)
        .map(|point| point.offset.min(text.len()))
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut consumed = 0;
    for cut in cuts {
        push_escaped(&text[consumed..cut], out);
        markers_at(bounds, node, cut, out);
        consumed = cut;
    }
    push_escaped(&text[consumed..], out);
}

fn push_escaped(text: &str, out: &mut String) {
    for ch in html_escape::encode_text(text).chars() {
        match ch {
            START_MARKER => out.push_str("&#91;"),
            END_MARKER => out.push_str("&#93;"),
            _ => out.push(ch),
        }
    }
}
