use std::{
    cmp,
    collections::{HashMap, HashSet},
};

use crate::{Comment, CommentId, CommentNode};

/// One page of root comments, each carrying its full reply subtree.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentPage {
    pub comments: Vec<CommentNode>,
    pub page: usize,
    pub total_pages: usize,
}

/// Assemble a flat, pre-sorted window of comment records into a forest
/// and paginate it at the root level.
///
/// Two-pass build: first a parent-id -> ordered children index, then a
/// recursive attach starting from the roots. Sibling order is the input
/// order, so the caller's sort key also orders siblings. Descendants are
/// never paginated: a root always ships with its whole subtree.
///
/// A record whose `parent_id` points outside the window is promoted to
/// root rather than silently dropped, so every input record appears in
/// the forest exactly once. Termination is guaranteed by the store: a
/// parent must exist before its child, so parent chains are acyclic.
pub fn assemble(records: &[Comment], page: usize, page_size: usize) -> CommentPage {
    debug_assert!(page_size > 0);
    let present: HashSet<CommentId> = records.iter().map(|c| c.id).collect();

    let mut children_of: HashMap<CommentId, Vec<&Comment>> = HashMap::new();
    let mut roots: Vec<&Comment> = Vec::new();
    for c in records {
        match c.parent_id {
            Some(parent) if present.contains(&parent) => {
                children_of.entry(parent).or_insert_with(Vec::new).push(c)
            }
            _ => roots.push(c),
        }
    }

    let total_pages = cmp::max(1, (roots.len() + page_size - 1) / page_size);
    let page = cmp::max(1, page);
    // page is client-supplied and unbounded; saturate instead of overflowing
    let comments = roots
        .iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .map(|c| build_node(c, &children_of))
        .collect();

    CommentPage {
        comments,
        page,
        total_pages,
    }
}

fn build_node(c: &Comment, children_of: &HashMap<CommentId, Vec<&Comment>>) -> CommentNode {
    let mut node = CommentNode::from(c);
    if let Some(kids) = children_of.get(&c.id) {
        node.children = kids.iter().map(|k| build_node(k, children_of)).collect();
    }
    node
}
