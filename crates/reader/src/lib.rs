//! Sequential reader for pagewalk galleries.
//!
//! A [`ReaderSession`] walks the flat item sequence of one gallery. It asks
//! the indexer for more source pages when navigation runs past the known
//! end, keeps neighbours preloaded, and drops look-ahead results that a
//! newer navigation has made stale.

pub mod session;
pub mod state;
pub mod view;

mod lookahead;

pub use session::ReaderSession;
pub use state::{NavigateOutcome, NavigationState, Rejection};
pub use view::{LogView, ReaderView};
