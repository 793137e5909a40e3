//! Block-style YAML writer for [`Node`] trees.
//!
//! Output uses two-space indentation with sequences nested under their key.
//! Strings are written plain when they read back unchanged, as literal
//! blocks when they span lines, and double-quoted otherwise.

use serde_yaml::Value;

use super::node::{MapEntry, Node, NodeKind, Scalar};

const INDENT: usize = 2;

/// Renders a document and its trailing comments.
#[must_use]
pub fn emit(root: &Node, foot: &[String]) -> String {
    let mut emitter = Emitter::default();
    emitter.comments(&root.head_comment.iter().collect::<Vec<_>>(), 0);
    match &root.kind {
        NodeKind::Mapping(entries) if !entries.is_empty() => emitter.mapping(entries, 0, false),
        NodeKind::Sequence(items) if !items.is_empty() => emitter.sequence(items, 0, false),
        _ => {
            let rendered = render_scalar(root);
            emitter.scalar_value(&rendered, root.line_comment.as_deref(), INDENT);
        }
    }
    for comment in foot {
        emitter.out.push_str(comment);
        emitter.out.push('\n');
    }
    emitter.out
}

#[derive(Debug, Default)]
struct Emitter {
    out: String,
}

/// How a scalar or empty collection is written after its key or dash.
#[derive(Debug)]
enum Rendered<'a> {
    Inline(String),
    Literal { indicator: &'static str, lines: Vec<&'a str> },
}

impl Emitter {
    fn indent(&mut self, indent: usize) {
        self.out.extend(std::iter::repeat_n(' ', indent));
    }

    fn comments(&mut self, comments: &[&String], indent: usize) {
        for comment in comments {
            self.indent(indent);
            self.out.push_str(comment);
            self.out.push('\n');
        }
    }

    fn line_comment(&mut self, comment: Option<&str>) {
        if let Some(comment) = comment {
            self.out.push(' ');
            self.out.push_str(comment);
        }
    }

    /// Writes mapping entries at `indent`. With `inline_first` the first
    /// entry continues the current line and its comments were already
    /// written by the caller.
    fn mapping(&mut self, entries: &[MapEntry], indent: usize, inline_first: bool) {
        for (i, entry) in entries.iter().enumerate() {
            if !(inline_first && i == 0) {
                self.comments(&entry.key.head_comment.iter().collect::<Vec<_>>(), indent);
                self.indent(indent);
            }
            self.out.push_str(&render_key(&entry.key));
            self.out.push(':');
            self.block_value(&entry.value, indent, entry.key.line_comment.as_deref());
        }
    }

    /// Writes sequence items at `indent`.
    fn sequence(&mut self, items: &[Node], indent: usize, inline_first: bool) {
        for (i, item) in items.iter().enumerate() {
            let inline = item.line_comment.is_none();
            if !(inline_first && i == 0) {
                let comments = if inline {
                    leading_comments(item)
                } else {
                    item.head_comment.iter().collect()
                };
                self.comments(&comments, indent);
                self.indent(indent);
            }
            self.out.push('-');
            match &item.kind {
                NodeKind::Mapping(entries) if !entries.is_empty() => {
                    if inline {
                        self.out.push(' ');
                        self.mapping(entries, indent + INDENT, true);
                    } else {
                        self.line_comment(item.line_comment.as_deref());
                        self.out.push('\n');
                        self.mapping(entries, indent + INDENT, false);
                    }
                }
                NodeKind::Sequence(nested) if !nested.is_empty() => {
                    if inline {
                        self.out.push(' ');
                        self.sequence(nested, indent + INDENT, true);
                    } else {
                        self.line_comment(item.line_comment.as_deref());
                        self.out.push('\n');
                        self.sequence(nested, indent + INDENT, false);
                    }
                }
                _ => {
                    self.out.push(' ');
                    let rendered = render_scalar(item);
                    self.scalar_value(&rendered, item.line_comment.as_deref(), indent + INDENT);
                }
            }
        }
    }

    /// Writes the value of a mapping entry after its `key:`.
    fn block_value(&mut self, value: &Node, indent: usize, comment: Option<&str>) {
        match &value.kind {
            NodeKind::Mapping(entries) if !entries.is_empty() => {
                self.line_comment(comment);
                self.out.push('\n');
                self.mapping(entries, indent + INDENT, false);
            }
            NodeKind::Sequence(items) if !items.is_empty() => {
                self.line_comment(comment);
                self.out.push('\n');
                self.sequence(items, indent + INDENT, false);
            }
            _ => {
                self.out.push(' ');
                let rendered = render_scalar(value);
                self.scalar_value(&rendered, comment, indent + INDENT);
            }
        }
    }

    fn scalar_value(&mut self, rendered: &Rendered<'_>, comment: Option<&str>, body_indent: usize) {
        match rendered {
            Rendered::Inline(text) => {
                self.out.push_str(text);
                self.line_comment(comment);
                self.out.push('\n');
            }
            Rendered::Literal { indicator, lines } => {
                self.out.push_str(indicator);
                self.line_comment(comment);
                self.out.push('\n');
                for line in lines {
                    if !line.is_empty() {
                        self.indent(body_indent);
                        self.out.push_str(line);
                    }
                    self.out.push('\n');
                }
            }
        }
    }
}

/// Head comments written before an inline item: the item's own plus those
/// of the first nested entry or item sharing its line.
fn leading_comments(item: &Node) -> Vec<&String> {
    let mut comments: Vec<&String> = item.head_comment.iter().collect();
    if item.line_comment.is_some() {
        return comments;
    }
    match &item.kind {
        NodeKind::Mapping(entries) => {
            if let Some(first) = entries.first() {
                comments.extend(first.key.head_comment.iter());
            }
        }
        NodeKind::Sequence(items) => {
            if let Some(first) = items.first() {
                comments.extend(leading_comments(first));
            }
        }
        NodeKind::Scalar(_) => {}
    }
    comments
}

fn render_key(key: &Node) -> String {
    match &key.kind {
        NodeKind::Scalar(Scalar::String(s)) => plain_or_quoted(s),
        NodeKind::Scalar(scalar) => scalar_text(scalar),
        _ => serde_json::to_string(&key.to_value())
            .unwrap_or_else(|_| double_quoted(&key.key_text().unwrap_or_default())),
    }
}

fn render_scalar(node: &Node) -> Rendered<'_> {
    match &node.kind {
        NodeKind::Mapping(_) => Rendered::Inline(String::from("{}")),
        NodeKind::Sequence(_) => Rendered::Inline(String::from("[]")),
        NodeKind::Scalar(Scalar::String(s)) => {
            literal_block(s).unwrap_or_else(|| Rendered::Inline(plain_or_quoted(s)))
        }
        NodeKind::Scalar(scalar) => Rendered::Inline(scalar_text(scalar)),
    }
}

fn scalar_text(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null => String::from("null"),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Number(n) => n.to_string(),
        Scalar::String(s) => plain_or_quoted(s),
    }
}

fn plain_or_quoted(s: &str) -> String {
    if is_plain_safe(s) {
        s.to_string()
    } else {
        double_quoted(s)
    }
}

/// A string can be written plain when it parses back to itself.
fn is_plain_safe(s: &str) -> bool {
    if s.is_empty() || s.trim() != s || s.chars().any(|c| c.is_control() || c == '\u{feff}') {
        return false;
    }
    matches!(serde_yaml::from_str::<Value>(s), Ok(Value::String(parsed)) if parsed == s)
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() || c == '\u{feff}' => {
                out.push_str(&format!("\\u{:04x}", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Literal block form for multi-line strings, when it reads back exactly.
fn literal_block(s: &str) -> Option<Rendered<'_>> {
    if !s.contains('\n') || s.chars().any(|c| c != '\n' && c != '\t' && (c.is_control() || c == '\u{feff}')) {
        return None;
    }
    let (body, indicator) = match s.strip_suffix('\n') {
        Some(body) if body.ends_with('\n') => return None,
        Some(body) => (body, "|"),
        None => (s, "|-"),
    };
    let lines: Vec<&str> = body.split('\n').collect();
    let first = lines.first()?;
    if first.is_empty() || first.starts_with([' ', '\t']) {
        return None;
    }
    if lines.iter().any(|line| !line.is_empty() && line.trim().is_empty()) {
        return None;
    }
    Some(Rendered::Literal { indicator, lines })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(yaml: &str) -> Node {
        Node::from_value(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn test_emit_block_layout() {
        let root = node("name: app\nlist: [a, b]\nnested: {x: 1, y: [{k: v, z: true}]}\nempty: []\nnone: {}\n");
        let expected = "\
name: app
list:
  - a
  - b
nested:
  x: 1
  y:
    - k: v
      z: true
empty: []
none: {}
";
        assert_eq!(emit(&root, &[]), expected);
    }

    #[test]
    fn test_emit_quotes_ambiguous_strings() {
        let root = node(r##"{a: "true", b: "1.5", c: "", d: "x: y", e: " pad", f: "#hash", g: "null", h: "ok text"}"##);
        let expected = "\
a: \"true\"
b: \"1.5\"
c: \"\"
d: \"x: y\"
e: \" pad\"
f: \"#hash\"
g: \"null\"
h: ok text
";
        assert_eq!(emit(&root, &[]), expected);
    }

    #[test]
    fn test_emit_multiline_strings() {
        let mut root = Node::mapping();
        root.insert("keep", Node::string("line one\n\nline two\n"));
        root.insert("strip", Node::string("a\nb"));
        root.insert("many", Node::string("a\n\n"));

        let expected = "\
keep: |
  line one

  line two
strip: |-
  a
  b
many: \"a\\n\\n\"
";
        let text = emit(&root, &[]);
        assert_eq!(text, expected);
        assert_eq!(serde_yaml::from_str::<Value>(&text).unwrap(), root.to_value());
    }

    #[test]
    fn test_emit_comments() {
        let mut root = node("name: app\nitems: [{kind: k, spec: s}, plain]\n");
        root.entry_mut("name").unwrap().key.head_comment.push(String::from("# header"));
        root.entry_mut("name").unwrap().key.set_line_comment("the app");
        let items = root.get_mut("items").unwrap().items_mut().unwrap();
        items[0].head_comment.push(String::from("# first"));
        items[0].entry_mut("kind").unwrap().key.set_line_comment("note");
        items[1].set_line_comment("scalar");

        let expected = "\
# header
name: app # the app
items:
  # first
  - kind: k # note
    spec: s
  - plain # scalar
# end
";
        assert_eq!(emit(&root, &[String::from("# end")]), expected);
    }

    #[test]
    fn test_emit_item_line_comment_breaks_line() {
        let mut root = node("items: [{a: 1}]\n");
        root.get_mut("items").unwrap().items_mut().unwrap()[0].set_line_comment("c");

        assert_eq!(emit(&root, &[]), "items:\n  - # c\n    a: 1\n");
    }

    #[test]
    fn test_emit_empty_document() {
        assert_eq!(emit(&Node::mapping(), &[]), "{}\n");
    }
}
