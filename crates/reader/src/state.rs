//! Foreground navigation state.

use pagewalk_core::PreloadCache;
use serde::Serialize;

/// Snapshot of one reader session's position and known sequence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub master_list: Vec<String>,
    /// Position in `master_list`, or -1 before the first navigation.
    pub current_index: i64,
    pub total_gallery_pages: Option<u32>,
    pub total_image_count: Option<u32>,
    /// Local view of the store's preload cache, refreshed with the master list.
    #[serde(skip)]
    pub preloaded: PreloadCache,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            master_list: Vec::new(),
            current_index: -1,
            total_gallery_pages: None,
            total_image_count: None,
            preloaded: PreloadCache::new(),
        }
    }
}

impl NavigationState {
    pub fn current(&self) -> Option<usize> {
        usize::try_from(self.current_index).ok()
    }

    /// Items left after the current position; the whole list when unset.
    pub fn remaining(&self) -> usize {
        match self.current() {
            Some(index) => self.master_list.len().saturating_sub(index + 1),
            None => self.master_list.len(),
        }
    }

    pub fn link(&self, index: usize) -> Option<&str> {
        self.master_list.get(index).map(String::as_str)
    }
}

/// Why a navigation request was turned away without any state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Negative target index.
    InvalidTarget,
    /// Another navigation is still in flight.
    Busy,
}

/// Result of [`crate::ReaderSession::navigate_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigateOutcome {
    Moved { index: usize, link: String },
    Rejected(Rejection),
    /// Every source page is indexed and the target is still past the end.
    EndOfGallery { len: usize },
}

impl NavigateOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_unset() {
        let state = NavigationState::default();
        assert_eq!(state.current_index, -1);
        assert_eq!(state.current(), None);
        assert_eq!(state.remaining(), 0);
    }

    #[test]
    fn test_remaining_counts_items_after_current() {
        let state = NavigationState {
            master_list: ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect(),
            current_index: 1,
            ..Default::default()
        };
        assert_eq!(state.remaining(), 2);
        assert_eq!(state.link(3), Some("d"));
        assert_eq!(state.link(4), None);
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let json = serde_json::to_value(NavigationState::default()).unwrap();
        assert_eq!(json["currentIndex"], -1);
        assert!(json["masterList"].as_array().unwrap().is_empty());
        assert!(json.get("preloaded").is_none());
    }
}
