//! External bookmark-tree provider contract.
//!
//! The tree is host-owned; the store always re-fetches it in full through
//! this trait. Mutation notifications travel separately: the host calls
//! the store's `handle_mutation` with no payload.

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::models::BookmarkNode;

#[derive(Error, Debug)]
pub enum SourceError {
    /// The host could not produce the tree.
    #[error("bookmark tree unavailable: {0}")]
    Unavailable(String),
}

/// Host-owned source of the bookmark tree.
#[async_trait]
pub trait TreeSource: Send + Sync {
    async fn fetch_tree(&self) -> Result<Vec<BookmarkNode>, SourceError>;
}

/// In-memory tree source backed by a swappable node list. Serves tests and
/// the CLI, which load a tree once and hand it to the store.
#[derive(Default)]
pub struct StaticTreeSource {
    tree: RwLock<Vec<BookmarkNode>>,
}

impl StaticTreeSource {
    pub fn new(tree: Vec<BookmarkNode>) -> Self {
        Self {
            tree: RwLock::new(tree),
        }
    }

    /// Replace the tree, the host's mutation in miniature.
    pub fn set_tree(&self, tree: Vec<BookmarkNode>) {
        *self.tree.write() = tree;
    }
}

#[async_trait]
impl TreeSource for StaticTreeSource {
    async fn fetch_tree(&self) -> Result<Vec<BookmarkNode>, SourceError> {
        Ok(self.tree.read().clone())
    }
}
