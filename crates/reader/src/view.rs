//! Display seam between the reader and whatever renders items.

/// Receives display updates from a reader session.
///
/// Calls arrive from background tasks, only for the navigation that is
/// current when the call is made.
pub trait ReaderView: Send + Sync + 'static {
    /// The item the reader moved to.
    fn show_item(&self, index: usize, link: &str, resource: &str);

    /// An immediate neighbour of the current item, ready for a quick flip.
    fn prime_neighbor(&self, index: usize, link: &str, resource: &str);

    /// A preview slot within the preload radius.
    fn show_preview(&self, index: usize, link: &str, resource: &str);
}

/// View that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogView;

impl ReaderView for LogView {
    fn show_item(&self, index: usize, link: &str, resource: &str) {
        tracing::info!(index, link, resource, "show item");
    }

    fn prime_neighbor(&self, index: usize, link: &str, resource: &str) {
        tracing::debug!(index, link, resource, "prime neighbour");
    }

    fn show_preview(&self, index: usize, link: &str, resource: &str) {
        tracing::debug!(index, link, resource, "show preview");
    }
}
