//! Bookmark tree flattening.
//!
//! Walks the host tree depth-first pre-order and emits one [`FlatRecord`]
//! per leaf, annotated with the joined titles of its ancestor folders.
//! Empty-titled folders are transparent: they contribute no path segment,
//! but their children are still visited. Nodes with neither `url` nor
//! `children` are skipped. Pure and deterministic.

use std::rc::Rc;

use crate::models::{BookmarkNode, FlatRecord};

/// Separator between folder titles in a record's `path`.
pub const PATH_SEPARATOR: &str = " / ";

/// Title substituted for leaves whose own title is empty.
pub const UNTITLED: &str = "(untitled)";

/// Flatten with the default [`PATH_SEPARATOR`].
pub fn flatten(nodes: &[BookmarkNode]) -> Vec<FlatRecord> {
    flatten_with_separator(nodes, PATH_SEPARATOR)
}

/// Flatten with a caller-chosen path separator.
///
/// Iterative with an explicit work stack: tree depth is host-controlled and
/// must not translate into call-stack depth.
pub fn flatten_with_separator(nodes: &[BookmarkNode], separator: &str) -> Vec<FlatRecord> {
    let mut out = Vec::new();
    let root: Rc<str> = Rc::from("");
    let mut stack: Vec<(&BookmarkNode, Rc<str>)> =
        nodes.iter().rev().map(|node| (node, root.clone())).collect();

    while let Some((node, prefix)) = stack.pop() {
        if let Some(url) = &node.url {
            let title = if node.title.is_empty() {
                UNTITLED.to_string()
            } else {
                node.title.clone()
            };
            out.push(FlatRecord {
                id: node.id.clone(),
                title,
                url: url.clone(),
                path: prefix.to_string(),
            });
        }
        if let Some(children) = &node.children {
            let child_prefix: Rc<str> = if node.title.is_empty() {
                prefix.clone()
            } else if prefix.is_empty() {
                Rc::from(node.title.as_str())
            } else {
                Rc::from(format!("{}{}{}", prefix, separator, node.title))
            };
            // Reversed push keeps sibling order after popping
            for child in children.iter().rev() {
                stack.push((child, child_prefix.clone()));
            }
        }
        // Neither url nor children: malformed, silently skipped
    }

    out
}
