//! Folder catalog
//!
//! Walks the folder tree once, before any message is fetched, and
//! produces the ordered work-list the message stream consumes.

use crate::config::{StartingPoint, TraversalOrder};
use crate::connection::MailboxConnection;
use crate::error::{Error, Result};
use crate::folder::{FolderEntry, FolderHandle};
use std::collections::VecDeque;
use tracing::debug;

/// Ordered folders still to be read, each with its starting message.
#[derive(Debug, Default)]
pub struct FolderCatalog {
    entries: VecDeque<FolderEntry>,
}

impl FolderCatalog {
    /// Traverse the hierarchy below `root` depth-first.
    ///
    /// A named `root` is the first entry; the namespace root only
    /// contributes its descendants. Folders that cannot be opened are
    /// descended into but get no entry. Any listing failure aborts the
    /// build.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] if any LIST command fails.
    pub async fn build<C: MailboxConnection + ?Sized>(
        connection: &mut C,
        root: &FolderHandle,
        starting_point: &StartingPoint,
        order: TraversalOrder,
    ) -> Result<Self> {
        let mut visited = Vec::new();
        if !root.is_namespace_root() && root.is_selectable() {
            visited.push(entry_for(root, starting_point));
        }

        // One iterator of unvisited siblings per level.
        let mut pending = vec![children_of(connection, root).await?.into_iter()];
        while let Some(siblings) = pending.last_mut() {
            let Some(child) = siblings.next() else {
                pending.pop();
                continue;
            };
            if child.is_selectable() {
                visited.push(entry_for(&child, starting_point));
            } else {
                debug!("Skipping unselectable folder {}", child);
            }
            let grandchildren = children_of(connection, &child).await?;
            pending.push(grandchildren.into_iter());
        }

        let entries = match order {
            TraversalOrder::PreOrder => visited.into(),
            // Popping a stack filled in visit order yields it reversed.
            TraversalOrder::Stack => visited.into_iter().rev().collect(),
        };
        Ok(Self { entries })
    }

    /// Take the next folder to read.
    pub fn pop(&mut self) -> Option<FolderEntry> {
        self.entries.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Folder names in the order they will be read.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.folder.name())
    }
}

/// Message numbers are 1-based; a strategy answering 0 starts at the
/// first message.
fn entry_for(folder: &FolderHandle, starting_point: &StartingPoint) -> FolderEntry {
    FolderEntry {
        folder: folder.clone(),
        start_at: starting_point.start_for(folder.name()).max(1),
    }
}

async fn children_of<C: MailboxConnection + ?Sized>(
    connection: &mut C,
    folder: &FolderHandle,
) -> Result<Vec<FolderHandle>> {
    connection.list_children(folder).await.map_err(|e| match e {
        Error::Catalog(_) => e,
        other => Error::Catalog(format!("listing children of '{folder}': {other}")),
    })
}
