//! Recovers comments from block-style YAML source.
//!
//! `serde_yaml` discards comments, so they are collected here with a
//! line-oriented scan that tracks the mapping/sequence nesting by
//! indentation. Each comment is recorded against the path of the node it
//! belongs to and later attached to the parsed tree. Comments whose owner
//! cannot be resolved are dropped; the tree itself is never affected.

use super::node::{Node, NodeKind};

/// One step in a path from the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Mapping entry by key text.
    Key(String),
    /// Sequence item by position.
    Index(usize),
}

/// Comments recovered for a single node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentSlot {
    /// Path of the mapping entry or sequence item owning the comments.
    pub path: Vec<PathSegment>,
    /// Full-line comments above the node.
    pub head: Vec<String>,
    /// Trailing comment on the node's line.
    pub line: Option<String>,
}

/// Everything recovered from a document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HarvestedComments {
    /// Per-node comments in document order.
    pub slots: Vec<CommentSlot>,
    /// Comments after the last node.
    pub foot: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Mapping,
    Sequence,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    indent: usize,
    path: Option<Vec<PathSegment>>,
    next_index: usize,
    /// Path of the most recent entry or item, parent of deeper content.
    child: Option<Vec<PathSegment>>,
}

/// Multi-line constructs whose lines carry no structure.
#[derive(Debug, Clone, Copy)]
enum Skip {
    /// Block scalar owned by a node at this indent.
    BlockScalar(usize),
    /// Flow collection with this many open brackets.
    Flow(usize),
    /// Quoted scalar missing its closing quote.
    Quoted(char),
}

/// Line-oriented comment collector.
#[derive(Debug, Default)]
struct Harvester {
    frames: Vec<Frame>,
    pending: Vec<String>,
    skip: Option<Skip>,
    out: HarvestedComments,
}

/// Collects comments from YAML source text.
#[must_use]
pub fn harvest(source: &str) -> HarvestedComments {
    let mut harvester = Harvester::default();
    for line in source.lines() {
        harvester.line(line);
    }
    harvester.out.foot = harvester.pending;
    harvester.out
}

impl Harvester {
    fn line(&mut self, line: &str) {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if self.skipping(line, trimmed, indent) {
            return;
        }
        if trimmed.is_empty() {
            return;
        }
        if trimmed.starts_with('#') {
            self.pending.push(trimmed.trim_end().to_string());
            return;
        }
        if trimmed.starts_with("---") || trimmed.starts_with("...") || trimmed.starts_with('%') {
            return;
        }

        let mut column = indent;
        let mut owner = indent;
        let mut rest = trimmed;
        let mut slot_path: Option<Vec<PathSegment>> = None;

        while let Some(after) = strip_dash(rest) {
            owner = column;
            slot_path = self.sequence_item(column);
            if let Some(path) = slot_path.as_ref() {
                self.attach_head(path.clone());
            }
            let content = after.trim_start();
            column += rest.len() - content.len();
            rest = content;
            if rest.is_empty() || rest.starts_with('#') {
                break;
            }
        }

        if let Some((key, value)) = split_key(rest) {
            owner = column;
            slot_path = self.mapping_entry(column, key);
            if let Some(path) = slot_path.as_ref() {
                self.attach_head(path.clone());
            }
            rest = value;
        } else if slot_path.is_none() {
            // continuation of a multi-line plain scalar
            return;
        }

        let (value, comment) = split_comment(rest);
        if let (Some(path), Some(comment)) = (slot_path, comment) {
            self.slot(path).line = Some(comment.to_string());
        }
        self.enter_multiline(value.trim(), owner);
    }

    /// Returns true if the line belongs to a multi-line construct.
    fn skipping(&mut self, line: &str, trimmed: &str, indent: usize) -> bool {
        match self.skip {
            None => false,
            Some(Skip::BlockScalar(owner)) => {
                if trimmed.is_empty() || indent > owner {
                    true
                } else {
                    self.skip = None;
                    false
                }
            }
            Some(Skip::Flow(depth)) => {
                let (value, _) = split_comment(line);
                let depth = (depth + count_open(value)).saturating_sub(count_close(value));
                self.skip = (depth > 0).then_some(Skip::Flow(depth));
                true
            }
            Some(Skip::Quoted(quote)) => {
                if closes_quote(line, quote) {
                    self.skip = None;
                }
                true
            }
        }
    }

    fn enter_multiline(&mut self, value: &str, owner_indent: usize) {
        if value.starts_with('|') || value.starts_with('>') {
            self.skip = Some(Skip::BlockScalar(owner_indent));
        } else if value.starts_with('[') || value.starts_with('{') {
            let open = count_open(value);
            let close = count_close(value);
            if open > close {
                self.skip = Some(Skip::Flow(open - close));
            }
        } else if let Some(quote) = value.chars().next().filter(|c| *c == '"' || *c == '\'') {
            if !closes_quote(&value[1..], quote) {
                self.skip = Some(Skip::Quoted(quote));
            }
        }
    }

    /// Registers a sequence item starting at `column` and returns its path.
    fn sequence_item(&mut self, column: usize) -> Option<Vec<PathSegment>> {
        self.frames.retain(|f| f.indent <= column);
        let continues = self
            .frames
            .last()
            .is_some_and(|f| f.indent == column && f.kind == FrameKind::Sequence);
        if !continues {
            let path = self.parent_path();
            self.frames.push(Frame {
                kind: FrameKind::Sequence,
                indent: column,
                path,
                next_index: 0,
                child: None,
            });
        }
        let frame = self.frames.last_mut()?;
        let index = frame.next_index;
        frame.next_index += 1;
        let path = frame.path.clone().map(|mut p| {
            p.push(PathSegment::Index(index));
            p
        });
        frame.child.clone_from(&path);
        path
    }

    /// Registers a mapping entry at `column` and returns its path.
    fn mapping_entry(&mut self, column: usize, key: String) -> Option<Vec<PathSegment>> {
        self.frames.retain(|f| {
            f.indent < column || (f.indent == column && f.kind == FrameKind::Mapping)
        });
        let continues = self
            .frames
            .last()
            .is_some_and(|f| f.indent == column && f.kind == FrameKind::Mapping);
        if !continues {
            let path = self.parent_path();
            self.frames.push(Frame {
                kind: FrameKind::Mapping,
                indent: column,
                path,
                next_index: 0,
                child: None,
            });
        }
        let frame = self.frames.last_mut()?;
        let path = frame.path.clone().map(|mut p| {
            p.push(PathSegment::Key(key));
            p
        });
        frame.child.clone_from(&path);
        path
    }

    /// Path of the node that new nested content belongs to.
    fn parent_path(&self) -> Option<Vec<PathSegment>> {
        match self.frames.last() {
            None => Some(Vec::new()),
            Some(frame) => frame.child.clone(),
        }
    }

    fn attach_head(&mut self, path: Vec<PathSegment>) {
        if self.pending.is_empty() {
            return;
        }
        let head = std::mem::take(&mut self.pending);
        self.slot(path).head.extend(head);
    }

    fn slot(&mut self, path: Vec<PathSegment>) -> &mut CommentSlot {
        let position = self.out.slots.iter().position(|s| s.path == path);
        let index = position.unwrap_or_else(|| {
            self.out.slots.push(CommentSlot {
                path,
                ..CommentSlot::default()
            });
            self.out.slots.len() - 1
        });
        &mut self.out.slots[index]
    }
}

fn strip_dash(rest: &str) -> Option<&str> {
    if rest == "-" {
        Some("")
    } else {
        rest.strip_prefix("- ").or_else(|| rest.strip_prefix("-\t"))
    }
}

/// Splits `key: value` into the key text and the remainder after the colon.
fn split_key(rest: &str) -> Option<(String, &str)> {
    let first = rest.chars().next()?;
    if matches!(first, '[' | '{' | '#' | '|' | '>' | '?' | '&' | '*' | '!') {
        return None;
    }
    if first == '"' || first == '\'' {
        let close = closing_quote(&rest[1..], first)? + 1;
        let raw = &rest[..=close];
        let after = rest[close + 1..].trim_start();
        let value = after.strip_prefix(':')?;
        if !(value.is_empty() || value.starts_with([' ', '\t'])) {
            return None;
        }
        let key: String = serde_yaml::from_str(raw).ok()?;
        return Some((key, value));
    }

    let bytes = rest.as_bytes();
    for (i, byte) in bytes.iter().enumerate() {
        match byte {
            b'#' if i > 0 && bytes[i - 1].is_ascii_whitespace() => return None,
            b':' if i + 1 == bytes.len() || bytes[i + 1].is_ascii_whitespace() => {
                let key = rest[..i].trim_end();
                if key.is_empty() {
                    return None;
                }
                return Some((key.to_string(), &rest[i + 1..]));
            }
            _ => {}
        }
    }
    None
}

/// Splits a value into its content and trailing comment.
fn split_comment(value: &str) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    let mut previous: Option<char> = None;
    let mut chars = value.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some('"') if c == '\\' => {
                chars.next();
            }
            Some('\'') if c == '\'' && chars.peek().is_some_and(|(_, n)| *n == '\'') => {
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => {
                let token_start = previous.is_none_or(|p| p.is_whitespace() || "[{,:".contains(p));
                if (c == '"' || c == '\'') && token_start {
                    quote = Some(c);
                } else if c == '#' && previous.is_none_or(char::is_whitespace) {
                    return (&value[..i], Some(value[i..].trim_end()));
                }
            }
        }
        previous = Some(c);
    }
    (value, None)
}

fn closing_quote(text: &str, quote: char) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if quote == '"' && c == '\\' {
            chars.next();
        } else if c == quote {
            if quote == '\'' && chars.peek().is_some_and(|(_, n)| *n == '\'') {
                chars.next();
            } else {
                return Some(i);
            }
        }
    }
    None
}

fn closes_quote(text: &str, quote: char) -> bool {
    closing_quote(text, quote).is_some()
}

fn count_open(text: &str) -> usize {
    text.chars().filter(|c| matches!(c, '[' | '{')).count()
}

fn count_close(text: &str) -> usize {
    text.chars().filter(|c| matches!(c, ']' | '}')).count()
}

/// Attaches harvested comments to the matching nodes of `root`.
pub fn attach(root: &mut Node, comments: &HarvestedComments) {
    for slot in &comments.slots {
        if let Some(node) = resolve(root, &slot.path) {
            node.head_comment.clone_from(&slot.head);
            node.line_comment.clone_from(&slot.line);
        }
    }
}

/// Finds the node owning comments for `path`: the key node for mapping
/// entries, the item node for sequence items.
fn resolve<'a>(root: &'a mut Node, path: &[PathSegment]) -> Option<&'a mut Node> {
    let (last, parents) = path.split_last()?;
    let mut current = root;
    for segment in parents {
        current = match segment {
            PathSegment::Key(key) => current.get_mut(key)?,
            PathSegment::Index(index) => current.items_mut()?.get_mut(*index)?,
        };
    }
    match last {
        PathSegment::Key(key) => current.entry_mut(key).map(|entry| &mut entry.key),
        PathSegment::Index(index) => match &mut current.kind {
            NodeKind::Sequence(items) => items.get_mut(*index),
            _ => None,
        },
    }
}
