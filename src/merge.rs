//! Reconciliation of several partial views of the same reply tree.
//!
//! Merging is a pure function: inputs are borrowed, every output node is fresh.
//! Key sets are unioned; nodes present on both sides take their scalar fields
//! from the side with real content (first side on a tie) and their replies from
//! the recursive merge of both sides. Reply lists are re-sorted at every level.
//!
//! Recursion depth equals tree depth, which parsing caps at `MAX_REPLY_DEPTH`.

use crate::model::{display_order, Comment, CommentTree};
use ahash::AHashMap;

/// Reconcile two versions of the same node.
///
/// The second side's scalars win only when the first side has no content
/// (empty or unavailable) and the second does. Otherwise the first-seen side
/// wins, so the result depends on the order listings are folded in.
pub fn merge_comment(first: &Comment, second: &Comment) -> Comment {
    let winner = if !first.has_content() && second.has_content() { second } else { first };
    Comment {
        id: winner.id.clone(),
        author: winner.author.clone(),
        body: winner.body.clone(),
        score: winner.score,
        created_at: winner.created_at,
        replies: merge_replies(&first.replies, &second.replies),
    }
}

/// Merge two reply lists by id and return them in display order.
///
/// Duplicate ids within one list are reconciled the same way as across lists.
pub fn merge_replies(a: &[Comment], b: &[Comment]) -> Vec<Comment> {
    let mut merged: Vec<Comment> = Vec::with_capacity(a.len().max(b.len()));
    let mut index: AHashMap<&str, usize> = AHashMap::with_capacity(a.len() + b.len());

    for c in a.iter().chain(b.iter()) {
        match index.get(c.id.as_str()) {
            Some(&i) => {
                let combined = merge_comment(&merged[i], c);
                merged[i] = combined;
            }
            None => {
                index.insert(c.id.as_str(), merged.len());
                merged.push(c.clone());
            }
        }
    }

    merged.sort_by(display_order);
    merged
}

/// Merge two top-level trees. Ids found on one side only are carried over as is.
pub fn merge_trees(a: &CommentTree, b: &CommentTree) -> CommentTree {
    let mut out = a.clone();
    for c in b.iter() {
        let combined = match out.get(&c.id) {
            Some(existing) => merge_comment(existing, c),
            None => c.clone(),
        };
        out.insert(combined);
    }
    out
}

/// Left fold of `merge_trees` over any number of listings.
pub fn merge_all<'a>(trees: impl IntoIterator<Item = &'a CommentTree>) -> CommentTree {
    trees
        .into_iter()
        .fold(CommentTree::new(), |acc, t| merge_trees(&acc, t))
}
