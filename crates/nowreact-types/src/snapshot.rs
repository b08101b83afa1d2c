//! The full canvas state: height, namespace, and grid.
//!
//! A [`Snapshot`] is both the in-memory state owned by the store and the
//! on-disk document. Its JSON form is:
//!
//! ```json
//! { "height": 1, "namespace": "nowreact", "emojis": ["", "😀", ...] }
//! ```

use serde::{Deserialize, Serialize};

use crate::grid::{Grid, GridSize};

/// Namespace given to freshly created canvases.
pub const DEFAULT_NAMESPACE: &str = "nowreact";

/// Height of a freshly created canvas.
pub const INITIAL_HEIGHT: u64 = 1;

/// Height, namespace, and cells of the canvas at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Monotonic height counter, never below [`INITIAL_HEIGHT`].
    pub height: u64,
    /// Namespace the canvas is published under.
    pub namespace: String,
    /// The cells.
    #[serde(rename = "emojis")]
    pub grid: Grid,
}

impl Snapshot {
    /// A blank canvas of the given size at the initial height.
    pub fn fresh(size: GridSize, namespace: impl Into<String>) -> Self {
        Self {
            height: INITIAL_HEIGHT,
            namespace: namespace.into(),
            grid: Grid::blank(size),
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::fresh(GridSize::default(), DEFAULT_NAMESPACE)
    }
}
