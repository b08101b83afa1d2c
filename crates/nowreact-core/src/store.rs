//! The authoritative in-memory canvas.
//!
//! [`StateStore`] owns the single [`Snapshot`] for the life of the process.
//! All access goes through one [`RwLock`]: reads share it, mutations hold it
//! exclusively, so a reader never sees a half-applied write and every
//! mutation that has returned is visible to every later read.
//!
//! Each accepted mutation bumps a revision counter and publishes it on a
//! [`watch`] channel while the write lock is still held, so published
//! revisions never go backwards. The checkpointer subscribes to it to learn
//! when the canvas needs saving; the store itself never touches the disk.

use nowreact_types::{GridError, GridSize, Snapshot};
use tokio::sync::{RwLock, watch};

/// Errors raised by store mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The cell index was out of range.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// An attempt to move the height counter backwards.
    #[error("height {requested} is below current height {current}")]
    HeightRegression {
        /// Height currently held by the store.
        current: u64,
        /// Height that was rejected.
        requested: u64,
    },
}

#[derive(Debug)]
struct Inner {
    snapshot: Snapshot,
    revision: u64,
}

/// Concurrency-safe owner of the canvas state.
///
/// Share it between tasks behind an [`Arc`](std::sync::Arc).
#[derive(Debug)]
pub struct StateStore {
    inner: RwLock<Inner>,
    changes: watch::Sender<u64>,
}

impl StateStore {
    /// Create the store from a loaded snapshot, or a blank canvas of `size`
    /// in `namespace` when nothing was loaded.
    ///
    /// A loaded snapshot keeps its own grid shape.
    pub fn initialize(size: GridSize, namespace: &str, loaded: Option<Snapshot>) -> Self {
        let snapshot = loaded.unwrap_or_else(|| Snapshot::fresh(size, namespace));
        tracing::debug!(
            height = snapshot.height,
            namespace = %snapshot.namespace,
            cells = snapshot.grid.cells().len(),
            "State store initialized"
        );
        let (changes, _) = watch::channel(0);
        Self {
            inner: RwLock::new(Inner {
                snapshot,
                revision: 0,
            }),
            changes,
        }
    }

    /// Deep copy of the current snapshot.
    pub async fn load(&self) -> Snapshot {
        self.inner.read().await.snapshot.clone()
    }

    /// Current height.
    pub async fn height(&self) -> u64 {
        self.inner.read().await.snapshot.height
    }

    /// Copy of the cells only, in row-major order.
    pub async fn cells(&self) -> Vec<String> {
        self.inner.read().await.snapshot.grid.cells().to_vec()
    }

    /// Shape of the grid. Fixed for the life of the store.
    pub async fn grid_size(&self) -> GridSize {
        self.inner.read().await.snapshot.grid.size()
    }

    /// Set one cell.
    ///
    /// Any string is accepted as content; the empty string clears the
    /// cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidIndex`] when `index` is negative or not
    /// below `size * size`. Nothing changes in that case and no checkpoint
    /// is requested.
    pub async fn set_cell(&self, index: i64, emoji: impl Into<String>) -> Result<(), GridError> {
        let emoji = emoji.into();
        let mut inner = self.inner.write().await;
        inner.snapshot.grid.set(index, emoji)?;
        let revision = Self::bump(&mut inner);
        self.changes.send_replace(revision);
        drop(inner);
        tracing::debug!(index, revision, "Cell updated");
        Ok(())
    }

    /// Raise the height counter to `height`.
    ///
    /// Setting the current height again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HeightRegression`] if `height` is below the
    /// current height.
    pub async fn advance_height(&self, height: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let current = inner.snapshot.height;
        if height < current {
            return Err(StoreError::HeightRegression {
                current,
                requested: height,
            });
        }
        if height == current {
            return Ok(());
        }
        inner.snapshot.height = height;
        let revision = Self::bump(&mut inner);
        self.changes.send_replace(revision);
        drop(inner);
        tracing::debug!(height, revision, "Height advanced");
        Ok(())
    }

    /// Revision counter: the number of accepted mutations so far.
    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    /// Watch channel that yields the revision after every accepted
    /// mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Revision and snapshot read under one lock acquisition, so the pair
    /// is consistent.
    pub async fn checkpoint_view(&self) -> (u64, Snapshot) {
        let inner = self.inner.read().await;
        (inner.revision, inner.snapshot.clone())
    }

    const fn bump(inner: &mut Inner) -> u64 {
        inner.revision = inner.revision.saturating_add(1);
        inner.revision
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use nowreact_types::DEFAULT_NAMESPACE;

    use super::*;

    fn store(side: usize) -> StateStore {
        StateStore::initialize(GridSize::new(side).unwrap(), DEFAULT_NAMESPACE, None)
    }

    #[tokio::test]
    async fn initialize_without_snapshot_is_blank() {
        let store = store(16);
        let snap = store.load().await;
        assert_eq!(snap.height, 1);
        assert_eq!(snap.namespace, "nowreact");
        assert_eq!(snap.grid.cells().len(), 256);
        assert_eq!(snap.grid.filled(), 0);
        assert_eq!(store.revision(), 0);
    }

    #[tokio::test]
    async fn initialize_keeps_loaded_snapshot() {
        let mut loaded = Snapshot::fresh(GridSize::new(2).unwrap(), "restored");
        loaded.height = 42;
        loaded.grid.set(3, "🐙".to_owned()).unwrap();

        let store =
            StateStore::initialize(GridSize::default(), DEFAULT_NAMESPACE, Some(loaded.clone()));
        assert_eq!(store.load().await, loaded);
        assert_eq!(store.height().await, 42);
        assert_eq!(store.grid_size().await.side(), 2);
    }

    #[tokio::test]
    async fn scenario_corner_cells_and_one_past_the_end() {
        let store = store(16);

        store.set_cell(0, "😀").await.unwrap();
        store.set_cell(255, "🔥").await.unwrap();
        let err = store.set_cell(256, "x").await.unwrap_err();
        assert_eq!(
            err,
            GridError::InvalidIndex {
                index: 256,
                cells: 256
            }
        );

        let cells = store.cells().await;
        assert_eq!(cells.first().map(String::as_str), Some("😀"));
        assert_eq!(cells.last().map(String::as_str), Some("🔥"));
        assert_eq!(cells.iter().filter(|c| !c.is_empty()).count(), 2);
    }

    #[tokio::test]
    async fn set_cell_changes_only_that_cell() {
        let store = store(4);
        for index in 0..16 {
            let before = store.load().await;
            store.set_cell(index, format!("e{index}")).await.unwrap();
            let after = store.load().await;
            for (i, (old, new)) in before.grid.cells().iter().zip(after.grid.cells()).enumerate()
            {
                if i64::try_from(i).unwrap() == index {
                    assert_eq!(new, &format!("e{index}"));
                } else {
                    assert_eq!(old, new);
                }
            }
        }
    }

    #[tokio::test]
    async fn rejected_set_is_a_no_op() {
        let store = store(4);
        store.set_cell(5, "🌙").await.unwrap();
        let before = store.load().await;
        let revision = store.revision();

        for index in [-1, -100, 16, 17, i64::MAX, i64::MIN] {
            assert!(store.set_cell(index, "x").await.is_err());
        }

        assert_eq!(store.load().await, before);
        assert_eq!(store.revision(), revision);
    }

    #[tokio::test]
    async fn empty_emoji_clears_a_cell() {
        let store = store(2);
        store.set_cell(1, "🍀").await.unwrap();
        store.set_cell(1, "").await.unwrap();
        assert!(store.cells().await.iter().all(String::is_empty));
        assert_eq!(store.revision(), 2);
    }

    #[tokio::test]
    async fn concurrent_writes_to_distinct_cells_are_all_kept() {
        let store = Arc::new(store(16));
        let mut handles = Vec::new();
        for index in 0..256_i64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set_cell(index, format!("{index}")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let cells = store.cells().await;
        for (i, cell) in cells.iter().enumerate() {
            assert_eq!(cell, &i.to_string());
        }
        assert_eq!(store.revision(), 256);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_see_a_shorter_grid() {
        let store = Arc::new(store(8));
        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for round in 0..50_i64 {
                    for index in 0..64 {
                        store.set_cell(index, format!("{round}")).await.unwrap();
                    }
                }
            })
        };
        for _ in 0..200 {
            assert_eq!(store.load().await.grid.cells().len(), 64);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert!(store.cells().await.iter().all(|c| c == "49"));
    }

    #[tokio::test]
    async fn height_only_moves_forward() {
        let store = store(2);
        assert_eq!(store.height().await, 1);

        store.advance_height(10).await.unwrap();
        assert_eq!(store.height().await, 10);
        assert_eq!(store.revision(), 1);

        store.advance_height(10).await.unwrap();
        assert_eq!(store.revision(), 1);

        let err = store.advance_height(3).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::HeightRegression {
                current: 10,
                requested: 3
            }
        );
        assert_eq!(store.height().await, 10);
    }

    #[tokio::test]
    async fn subscribers_are_notified_of_mutations() {
        let store = store(2);
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow_and_update(), 0);

        store.set_cell(0, "a").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        assert!(store.set_cell(9, "a").await.is_err());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn checkpoint_view_pairs_revision_with_snapshot() {
        let store = store(2);
        store.set_cell(2, "z").await.unwrap();
        let (revision, snap) = store.checkpoint_view().await;
        assert_eq!(revision, 1);
        assert_eq!(snap.grid.get(2), Some("z"));
    }
}
