//! Span-annotated outline of an overlay file
//!
//! The outline is an arena of nodes with parent back-references. It only
//! understands the structural levels of the overlay layout (top-level
//! sections, `components`, component names, index scopes and entries); entry
//! values and unrelated sections are kept as opaque line ranges. Decoding of
//! values is left to `serde_yaml`; the outline exists so edits can rewrite
//! the smallest span of text.

use crate::error::{CoreError, Result};

pub(crate) type NodeId = usize;

pub(crate) const ROOT: NodeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Root,
    /// Top-level key other than `components`
    Section,
    Components,
    Component,
    Scope(usize),
    Entry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    /// Document start/end markers and directives at column zero
    Marker,
    Content,
}

#[derive(Debug, Clone)]
pub(crate) struct Line {
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset past the line terminator
    pub end: usize,
    /// Byte offset past the last non-terminator character
    pub content_end: usize,
    pub indent: usize,
    kind: LineKind,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub key: String,
    pub indent: usize,
    /// Line holding the key
    pub line: usize,
    /// Last content line belonging to this node's block
    pub last_line: usize,
    /// Byte offset just past the `:` that follows the key
    pub value_start: usize,
    /// The key line carries a value (not just a comment)
    pub inline: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Syntax {
    pub lines: Vec<Line>,
    pub nodes: Vec<Node>,
}

impl Syntax {
    pub fn parse(source_name: &str, text: &str) -> Result<Self> {
        let lines = scan_lines(text);
        let mut nodes = vec![Node {
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
            key: String::new(),
            indent: 0,
            line: 0,
            last_line: 0,
            value_start: 0,
            inline: false,
        }];
        let mut stack: Vec<NodeId> = vec![ROOT];

        for (i, line) in lines.iter().enumerate() {
            if line.kind != LineKind::Content {
                continue;
            }
            let content = &text[line.start + line.indent..line.content_end];

            if text[line.start..line.start + line.indent].contains('\t') {
                return Err(CoreError::parse(
                    source_name,
                    None,
                    format!("line {}: tabs are not allowed in indentation", i + 1),
                ));
            }

            while stack.len() > 1 {
                let top = &nodes[stack[stack.len() - 1]];
                if line.indent > top.indent {
                    break;
                }
                // A block sequence may sit at the same indentation as its key
                if line.indent == top.indent && is_sequence_item(content) && absorbs(top) {
                    break;
                }
                stack.pop();
            }

            let parent = stack[stack.len() - 1];
            if parent != ROOT && absorbs(&nodes[parent]) {
                extend_block(&mut nodes, parent, i);
                continue;
            }

            let (key, after_colon) = parse_key(content).ok_or_else(|| {
                CoreError::parse(
                    source_name,
                    None,
                    format!("line {}: expected a 'key:' mapping entry", i + 1),
                )
            })?;

            let kind = match nodes[parent].kind {
                NodeKind::Root if key == "components" => NodeKind::Components,
                NodeKind::Root => NodeKind::Section,
                NodeKind::Components => NodeKind::Component,
                NodeKind::Component => match scope_index(&key) {
                    Some(index) => NodeKind::Scope(index),
                    None => NodeKind::Entry,
                },
                NodeKind::Scope(_) => NodeKind::Entry,
                NodeKind::Section | NodeKind::Entry => unreachable!("absorbed above"),
            };

            let value_start = line.start + line.indent + after_colon;
            let rest = text[value_start..line.content_end].trim();
            let inline = !(rest.is_empty() || rest.starts_with('#'));

            let id = nodes.len();
            nodes.push(Node {
                kind,
                parent: Some(parent),
                children: Vec::new(),
                key,
                indent: line.indent,
                line: i,
                last_line: i,
                value_start,
                inline,
            });
            nodes[parent].children.push(id);
            extend_block(&mut nodes, parent, i);
            stack.push(id);
        }

        Ok(Self { lines, nodes })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id].children.iter().copied()
    }

    pub fn components(&self) -> Option<NodeId> {
        self.children(ROOT)
            .find(|&id| self.nodes[id].kind == NodeKind::Components)
    }

    pub fn component(&self, components: NodeId, name: &str) -> Option<NodeId> {
        self.children(components).find(|&id| self.nodes[id].key == name)
    }

    pub fn scope(&self, component: NodeId, index: usize) -> Option<NodeId> {
        self.children(component)
            .find(|&id| self.nodes[id].kind == NodeKind::Scope(index))
    }

    pub fn entry(&self, scope: NodeId, key: &str) -> Option<NodeId> {
        self.children(scope)
            .find(|&id| self.nodes[id].kind == NodeKind::Entry && self.nodes[id].key == key)
    }

    /// Byte offset where the node's key line begins
    pub fn block_start(&self, id: NodeId) -> usize {
        self.lines[self.nodes[id].line].start
    }

    /// Like `block_start`, but including comment lines directly above the key
    pub fn leading_start(&self, id: NodeId) -> usize {
        let mut line = self.nodes[id].line;
        while line > 0 && self.lines[line - 1].kind == LineKind::Comment {
            line -= 1;
        }
        self.lines[line].start
    }

    /// Byte offset past the last character of the node's block, before the line terminator
    pub fn value_end(&self, id: NodeId) -> usize {
        self.lines[self.nodes[id].last_line].content_end
    }

    /// Byte offset past the line terminator of the node's block
    pub fn block_end(&self, id: NodeId) -> usize {
        self.lines[self.nodes[id].last_line].end
    }

    /// Byte offset past the terminator of the node's key line
    pub fn key_line_end(&self, id: NodeId) -> usize {
        self.lines[self.nodes[id].line].end
    }

    /// Byte offset of a closing `...` marker, or the end of the text
    pub fn document_end(&self, text: &str) -> usize {
        self.lines
            .iter()
            .find(|l| l.kind == LineKind::Marker && text[l.start..].starts_with("..."))
            .map_or(text.len(), |l| l.start)
    }

    /// Indentation step used by the file, two spaces when undetectable
    pub fn indent_step(&self) -> usize {
        self.nodes
            .iter()
            .skip(1)
            .filter_map(|n| {
                let parent = &self.nodes[n.parent?];
                (parent.kind != NodeKind::Root && n.indent > parent.indent)
                    .then(|| n.indent - parent.indent)
            })
            .next()
            .unwrap_or(2)
    }

    /// Indentation for a new child of `id`
    pub fn child_indent(&self, id: NodeId) -> usize {
        match self.nodes[id].children.first() {
            Some(&first) => self.nodes[first].indent,
            None if id == ROOT => 0,
            None => self.nodes[id].indent + self.indent_step(),
        }
    }
}

/// Entries and opaque sections swallow their indented continuation lines,
/// as do containers written inline (`name: {a: b,` ... `}`)
fn absorbs(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Entry | NodeKind::Section) || node.inline
}

fn extend_block(nodes: &mut [Node], from: NodeId, line: usize) {
    let mut current = Some(from);
    while let Some(id) = current {
        if nodes[id].last_line < line {
            nodes[id].last_line = line;
        }
        current = nodes[id].parent;
    }
}

fn is_sequence_item(content: &str) -> bool {
    content == "-" || content.starts_with("- ")
}

fn scope_index(key: &str) -> Option<usize> {
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        key.parse().ok()
    } else {
        None
    }
}

fn scan_lines(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;

    for raw in text.split_inclusive('\n') {
        let end = start + raw.len();
        let bare = raw.trim_end_matches(['\n', '\r']);
        let content_end = start + bare.len();
        let indent = bare.len() - bare.trim_start_matches([' ', '\t']).len();
        let trimmed = bare.trim();

        let kind = if trimmed.is_empty() {
            LineKind::Blank
        } else if trimmed.starts_with('#') {
            LineKind::Comment
        } else if indent == 0 && is_marker(bare) {
            LineKind::Marker
        } else {
            LineKind::Content
        };

        lines.push(Line {
            start,
            end,
            content_end,
            indent,
            kind,
        });
        start = end;
    }

    lines
}

fn is_marker(line: &str) -> bool {
    let is_bare = |marker: &str| {
        line.strip_prefix(marker)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
    };
    line.starts_with('%') || is_bare("---") || is_bare("...")
}

/// Split `key: rest` into the decoded key and the offset just past the colon
fn parse_key(content: &str) -> Option<(String, usize)> {
    let (key, after_key) = match content.as_bytes().first()? {
        b'"' => {
            let close = closing_double_quote(content)?;
            let key: String = serde_json::from_str(&content[..=close]).ok()?;
            (key, close + 1)
        }
        b'\'' => {
            let close = closing_single_quote(content)?;
            (content[1..close].replace("''", "'"), close + 1)
        }
        b'-' | b'?' | b'[' | b'{' | b'&' | b'*' | b'!' | b'|' | b'>' | b'%' | b'@' | b'`' => {
            return None;
        }
        _ => {
            let colon = plain_key_colon(content)?;
            (content[..colon].trim_end().to_string(), colon)
        }
    };

    let rest = &content[after_key..];
    let spaces = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let rest = &rest[spaces..];
    if !rest.starts_with(':') {
        return None;
    }
    let after_colon = after_key + spaces + 1;
    match content.as_bytes().get(after_colon) {
        None | Some(b' ') | Some(b'\t') => Some((key, after_colon)),
        _ => None,
    }
}

fn plain_key_colon(content: &str) -> Option<usize> {
    let bytes = content.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && i > 0 && matches!(bytes[i - 1], b' ' | b'\t') {
            return None;
        }
        if b == b':' && matches!(bytes.get(i + 1), None | Some(b' ') | Some(b'\t')) {
            return Some(i);
        }
    }
    None
}

/// Offset of the `#` opening a trailing comment in a one-line value:
/// preceded by whitespace and outside quoted scalars
pub(crate) fn comment_start(value: &str) -> Option<usize> {
    let bytes = value.as_bytes();
    let mut prev = b' ';
    let mut i = 0;
    while i < bytes.len() {
        let opens_scalar = matches!(prev, b' ' | b'\t' | b'[' | b'{' | b',' | b':');
        match bytes[i] {
            b'"' if opens_scalar => i += closing_double_quote(&value[i..])?,
            b'\'' if opens_scalar => i += closing_single_quote(&value[i..])?,
            b'#' if prev == b' ' || prev == b'\t' => return Some(i),
            _ => {}
        }
        prev = bytes[i];
        i += 1;
    }
    None
}

fn closing_double_quote(content: &str) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn closing_single_quote(content: &str) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}
