use ahash::AHashMap;
use std::cmp::Ordering;

/// Placeholder body meaning "content not available"; ranks like an empty body.
pub const UNAVAILABLE_BODY: &str = "[unavailable]";
pub const DELETED_AUTHOR: &str = "[deleted]";

/// A reply-tree node. Owns its replies; never shared between posts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_at: i64,
    pub replies: Vec<Comment>,
}

impl Comment {
    /// True unless the body is empty or the unavailable sentinel.
    pub fn has_content(&self) -> bool {
        !self.body.is_empty() && self.body != UNAVAILABLE_BODY
    }

    /// This node plus all descendants.
    pub fn subtree_len(&self) -> usize {
        let mut n = 0usize;
        let mut stack: Vec<&Comment> = vec![self];
        while let Some(c) = stack.pop() {
            n += 1;
            stack.extend(c.replies.iter());
        }
        n
    }
}

/// Canonical display order: score desc, then created_at desc, then id asc.
/// The id key makes the order total, so it never depends on input order.
pub fn display_order(a: &Comment, b: &Comment) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Top-level comments of a post keyed by id.
#[derive(Clone, Debug, Default)]
pub struct CommentTree {
    nodes: AHashMap<String, Comment>,
}

impl CommentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, returning the comment previously stored under the same id.
    pub fn insert(&mut self, comment: Comment) -> Option<Comment> {
        self.nodes.insert(comment.id.clone(), comment)
    }

    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Comment> {
        self.nodes.remove(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.nodes.values()
    }

    /// Top-level comments in display order.
    pub fn ordered(&self) -> Vec<&Comment> {
        let mut v: Vec<&Comment> = self.nodes.values().collect();
        v.sort_by(|a, b| display_order(a, b));
        v
    }

    /// Every comment at every depth.
    pub fn total_comments(&self) -> usize {
        self.nodes.values().map(Comment::subtree_len).sum()
    }
}

impl FromIterator<Comment> for CommentTree {
    fn from_iter<I: IntoIterator<Item = Comment>>(iter: I) -> Self {
        let mut t = CommentTree::new();
        for c in iter {
            t.insert(c);
        }
        t
    }
}

/// A canonical post with its reconciled reply tree.
#[derive(Clone, Debug)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub created_at: i64,
    pub subreddit: String,
    pub comments: CommentTree,
}
