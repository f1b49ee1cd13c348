//! State machines for the feed and the per-section concept trees.
//!
//! Controllers never perform I/O. Operations that need a network call return
//! a request value ([`FeedFetch`], [`TreeFetch`], [`ExpandRequest`]) which the
//! task layer runs; the result comes back through the matching `complete` /
//! `finish_*` method.

mod feed;
mod tree;

pub use feed::{
    ContentSection, FeedController, FeedFetch, LoadingState, LOADING_MESSAGES,
    RECENT_TOPIC_WINDOW,
};
pub use tree::{ExpandRequest, TreeController, TreeFetch, TreeRow, TreeState, MAX_TREE_DEPTH};
