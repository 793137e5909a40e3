//! Format-preserving YAML documents.
//!
//! A [`Document`] keeps the raw node tree of a delivery config together with
//! its comments, so that a load, mutate, save cycle leaves everything the
//! caller did not touch as the user wrote it.
//!
//! - [`node`]: the ordered node tree
//! - [`comments`]: comment recovery from source text
//! - [`emitter`]: block-style output
//! - [`sort`]: canonical key ordering

pub mod comments;
pub mod emitter;
pub mod node;
pub mod sort;

pub use node::{MapEntry, Node, NodeKind, Scalar};
pub use sort::{KEY_SORT_PRIORITY, sort_keys};

use serde_yaml::Value;

use crate::error::DocumentError;

/// A parsed YAML document with comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Root node. Always a mapping for delivery configs.
    pub root: Node,
    /// Comments after the last node.
    pub foot_comment: Vec<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// Creates a document with an empty mapping root.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            root: Node::mapping(),
            foot_comment: Vec::new(),
        }
    }

    /// Parses YAML bytes into a document, recovering comments.
    ///
    /// An empty document yields an empty mapping root.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidContent`] if the bytes are not valid
    /// YAML.
    pub fn parse(content: &[u8]) -> Result<Self, DocumentError> {
        let value: Value = serde_yaml::from_slice(content)
            .map_err(|e| DocumentError::invalid_yaml(content, e))?;
        let mut root = match value {
            Value::Null => Node::mapping(),
            value => Node::from_value(value),
        };

        let source = String::from_utf8_lossy(content);
        let harvested = comments::harvest(&source);
        comments::attach(&mut root, &harvested);

        Ok(Self {
            root,
            foot_comment: harvested.foot,
        })
    }

    /// Renders the document as YAML.
    #[must_use]
    pub fn emit(&self) -> String {
        emitter::emit(&self.root, &self.foot_comment)
    }

    /// Applies the canonical key ordering to the whole tree.
    pub fn sort_keys(&mut self) {
        sort_keys(&mut self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAVED: &str = "\
# managed by mdctl
name: myapp-manifest
application: myapp
artifacts:
  - name: myapp
    type: docker
environments:
  # first stage
  - name: testing
    constraints:
      - type: manual-judgement
    resources:
      - kind: titus/cluster@v1 # myapp/test
        spec:
          container:
            reference: myapp
          locations:
            account: test
            regions:
              - name: us-east-1
          moniker:
            app: myapp
    notes: |
      keep # this
      text
serviceAccount: someone@example.com
# end of file
";

    #[test]
    fn test_parse_emit_round_trip() {
        let doc = Document::parse(SAVED.as_bytes()).unwrap();
        assert_eq!(doc.emit(), SAVED);

        let again = Document::parse(doc.emit().as_bytes()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_parse_attaches_comments() {
        let doc = Document::parse(SAVED.as_bytes()).unwrap();

        assert_eq!(doc.foot_comment, vec!["# end of file"]);
        assert_eq!(
            doc.root.entry("name").unwrap().key.head_comment,
            vec!["# managed by mdctl"]
        );
        let env = &doc.root.get("environments").unwrap().items().unwrap()[0];
        assert_eq!(env.head_comment, vec!["# first stage"]);
        let resource = &env.get("resources").unwrap().items().unwrap()[0];
        assert_eq!(
            resource.entry("kind").unwrap().key.line_comment.as_deref(),
            Some("# myapp/test")
        );
    }

    #[test]
    fn test_parse_empty_document() {
        let doc = Document::parse(b"# only a comment\n").unwrap();

        assert!(doc.root.entries().unwrap().is_empty());
        assert_eq!(doc.emit(), "{}\n# only a comment\n");
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = Document::parse(b"a: [unclosed").unwrap_err();
        match err {
            DocumentError::InvalidContent { content, .. } => assert_eq!(content, b"a: [unclosed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sort_then_emit_is_stable() {
        let mut doc = Document::parse(b"zeta: 1\nname: x # n\nkind: k\n").unwrap();
        doc.sort_keys();
        let first = doc.emit();
        assert_eq!(first, "kind: k\nname: x # n\nzeta: 1\n");

        let mut reloaded = Document::parse(first.as_bytes()).unwrap();
        reloaded.sort_keys();
        assert_eq!(reloaded.emit(), first);
    }
}
