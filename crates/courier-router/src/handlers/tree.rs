//! Handler tree and path resolver

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::handler::{Handler, HandlerGroup};

/// Path separator inside a handler tree
pub const PATH_SEPARATOR: char = '/';

/// Entry in a handler tree
#[derive(Clone)]
pub enum HandlerNode {
    Leaf(Arc<dyn Handler>),
    Group(HandlerTree),
}

impl HandlerNode {
    pub fn leaf(handler: impl Handler + 'static) -> Self {
        Self::Leaf(Arc::new(handler))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl From<HandlerTree> for HandlerNode {
    fn from(tree: HandlerTree) -> Self {
        Self::Group(tree)
    }
}

impl fmt::Debug for HandlerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(_) => f.write_str("Leaf"),
            Self::Group(tree) => f.debug_tuple("Group").field(tree).finish(),
        }
    }
}

/// A leaf found by [`HandlerTree::resolve`], with the tree it lives in
#[derive(Clone)]
pub struct Resolved {
    pub handler: Arc<dyn Handler>,
    pub group: HandlerGroup,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved").field("group", &self.group).finish()
    }
}

/// Named handlers, nested to any depth.
///
/// Entries are shared copy-on-write, so cloning a tree (and handing a
/// resolved handler its group) is a pointer copy. Mutating a shared tree
/// copies only the level being changed.
#[derive(Clone, Default)]
pub struct HandlerTree {
    entries: Arc<BTreeMap<String, HandlerNode>>,
}

impl HandlerTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert) for a leaf.
    pub fn with_handler(mut self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.insert(name, HandlerNode::leaf(handler));
        self
    }

    /// Builder form of [`insert`](Self::insert) for a nested group.
    pub fn with_group(mut self, name: impl Into<String>, group: HandlerTree) -> Self {
        self.insert(name, HandlerNode::Group(group));
        self
    }

    /// Adds or replaces one entry. Other entries are untouched.
    pub fn insert(&mut self, name: impl Into<String>, node: impl Into<HandlerNode>) {
        Arc::make_mut(&mut self.entries).insert(name.into(), node.into());
    }

    /// Adds every top-level entry of `other`, overwriting same-named ones.
    pub fn merge(&mut self, other: HandlerTree) {
        let entries = Arc::make_mut(&mut self.entries);
        entries.extend(Arc::unwrap_or_clone(other.entries));
    }

    /// Merges `other` into the group at `key`.
    ///
    /// A missing key becomes a new group; a leaf at `key` is replaced.
    pub fn merge_at(&mut self, key: &str, other: HandlerTree) {
        let entries = Arc::make_mut(&mut self.entries);
        match entries.get_mut(key) {
            Some(HandlerNode::Group(group)) => group.merge(other),
            _ => {
                entries.insert(key.to_string(), HandlerNode::Group(other));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&HandlerNode> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn shares_entries_with(&self, other: &HandlerTree) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// Every leaf path in the tree, depth first.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<(String, &HandlerTree)> = vec![(String::new(), self)];

        while let Some((prefix, tree)) = stack.pop() {
            for (name, node) in tree.entries.iter().rev() {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}{}{}", prefix, PATH_SEPARATOR, name)
                };
                match node {
                    HandlerNode::Leaf(_) => out.push(path),
                    HandlerNode::Group(group) => stack.push((path, group)),
                }
            }
        }

        out.sort();
        out
    }

    /// Resolves a slash-delimited path to a leaf.
    ///
    /// Every segment but the last must name a group and the last must name
    /// a leaf. Anything else, including a leaf met before the end, is `None`.
    pub fn resolve(&self, path: &str) -> Option<Resolved> {
        if path.is_empty() {
            return None;
        }

        let mut current = self;
        let mut segments = path.split(PATH_SEPARATOR).peekable();

        while let Some(segment) = segments.next() {
            let node = current.entries.get(segment)?;
            let last = segments.peek().is_none();

            match (node, last) {
                (HandlerNode::Leaf(handler), true) => {
                    return Some(Resolved {
                        handler: Arc::clone(handler),
                        group: HandlerGroup::new(current.clone()),
                    });
                }
                (HandlerNode::Group(group), false) => current = group,
                _ => return None,
            }
        }

        None
    }
}

impl fmt::Debug for HandlerTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{HandlerContext, HandlerOutput};
    use courier_core::{SenderInfo, Value};
    use serde_json::json;

    fn constant(value: &'static str) -> impl Handler {
        move |_data: Value, _ctx: HandlerContext| HandlerOutput::value(value)
    }

    fn sample() -> HandlerTree {
        HandlerTree::new()
            .with_handler("greet", constant("hi"))
            .with_group(
                "nested",
                HandlerTree::new()
                    .with_handler("hello", constant("world"))
                    .with_group("deeper", HandlerTree::new().with_handler("leaf", constant("deep"))),
            )
    }

    fn run(resolved: Resolved) -> Value {
        let ctx = HandlerContext::new(SenderInfo::new(), "test", "", resolved.group.clone());
        match resolved.handler.call(Value::Null, ctx) {
            HandlerOutput::Ready(Ok(value)) => value,
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_leaf() {
        let tree = sample();
        assert_eq!(run(tree.resolve("greet").unwrap()), json!("hi"));
        assert_eq!(run(tree.resolve("nested/hello").unwrap()), json!("world"));
        assert_eq!(run(tree.resolve("nested/deeper/leaf").unwrap()), json!("deep"));
    }

    #[test]
    fn test_resolve_misses() {
        let tree = sample();
        assert!(tree.resolve("").is_none());
        assert!(tree.resolve("missing").is_none());
        assert!(tree.resolve("nested").is_none());
        assert!(tree.resolve("nested/").is_none());
        assert!(tree.resolve("/greet").is_none());
        assert!(tree.resolve("nested/missing").is_none());
    }

    #[test]
    fn test_leaf_mid_path_is_not_found() {
        let tree = sample();
        assert!(tree.resolve("greet/extra").is_none());
        assert!(tree.resolve("nested/hello/again").is_none());
    }

    #[test]
    fn test_resolved_group_is_containing_tree() {
        let tree = sample();
        let resolved = tree.resolve("nested/hello").unwrap();
        assert_eq!(resolved.group.names(), vec!["deeper", "hello"]);
        assert!(resolved.group.contains("deeper/leaf"));
        assert!(!resolved.group.contains("greet"));
    }

    #[test]
    fn test_resolved_group_shares_storage() {
        let tree = sample();
        let resolved = tree.resolve("greet").unwrap();
        assert!(resolved.group.tree().shares_entries_with(&tree));

        let Some(HandlerNode::Group(nested)) = tree.get("nested") else {
            panic!("nested is not a group");
        };
        let resolved = tree.resolve("nested/hello").unwrap();
        assert!(resolved.group.tree().shares_entries_with(nested));
    }

    #[test]
    fn test_snapshot_survives_later_merges() {
        let mut tree = sample();
        let snapshot = tree.clone();
        let group = tree.resolve("nested/hello").unwrap().group;

        tree.merge(HandlerTree::new().with_handler("extra", constant("x")));
        tree.merge_at("nested", HandlerTree::new().with_handler("added", constant("a")));

        assert!(!tree.shares_entries_with(&snapshot));
        assert!(snapshot.resolve("extra").is_none());
        assert!(snapshot.resolve("nested/added").is_none());
        assert_eq!(group.names(), vec!["deeper", "hello"]);
        assert!(tree.resolve("nested/added").is_some());
    }

    #[test]
    fn test_merge_keeps_siblings() {
        let mut tree = sample();
        tree.merge(HandlerTree::new().with_handler("extra", constant("x")));
        assert!(tree.resolve("greet").is_some());
        assert!(tree.resolve("extra").is_some());
        assert!(tree.resolve("nested/hello").is_some());

        tree.merge(HandlerTree::new().with_handler("greet", constant("hello again")));
        assert_eq!(run(tree.resolve("greet").unwrap()), json!("hello again"));
    }

    #[test]
    fn test_merge_at() {
        let mut tree = sample();
        tree.merge_at("nested", HandlerTree::new().with_handler("added", constant("a")));
        assert!(tree.resolve("nested/hello").is_some());
        assert!(tree.resolve("nested/added").is_some());

        tree.merge_at("fresh", HandlerTree::new().with_handler("one", constant("1")));
        assert!(tree.resolve("fresh/one").is_some());

        // A leaf at the key is replaced by the group
        tree.merge_at("greet", HandlerTree::new().with_handler("sub", constant("s")));
        assert!(tree.resolve("greet").is_none());
        assert!(tree.resolve("greet/sub").is_some());
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            sample().paths(),
            vec!["greet", "nested/deeper/leaf", "nested/hello"]
        );
    }
}
