//! Locating and repairing an archive embedded in a text-wrapped stream.
//!
//! The stages run strictly in order, each on a single buffer:
//!
//! - [`scanner`]: every PK signature in the raw bytes
//! - [`region`]: the slice from the first local header to the last
//!   end-of-central-directory record
//! - [`cleaner`]: wrapper artifacts stripped from the slice's prefix window
//!
//! The result is handed to [`crate::sheet::validate`].

pub mod cleaner;
pub mod region;
pub mod scanner;

pub use cleaner::{ARTIFACT_BYTES, PrefixWindow, SanitizedArchive, WindowAnchor, clean};
pub use region::{CandidateRegion, RegionEnd, extract_region};
pub use scanner::{ScanResult, SignatureKind, SignatureMatch, scan};

use serde::{Deserialize, Serialize};

/// Tunables for one salvage pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalvageConfig {
    pub window: PrefixWindow,
    pub anchor: WindowAnchor,
    /// Report a missing end-of-central-directory record instead of trying
    /// the rest of the stream.
    pub strict_terminator: bool,
}

impl SalvageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, bytes: usize) -> Self {
        self.window = PrefixWindow(bytes);
        self
    }

    pub fn with_anchor(mut self, anchor: WindowAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_strict_terminator(mut self, enabled: bool) -> Self {
        self.strict_terminator = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SalvageConfig::new();
        assert_eq!(config.window, PrefixWindow(100));
        assert_eq!(config.anchor, WindowAnchor::Region);
        assert!(!config.strict_terminator);
    }

    #[test]
    fn builder() {
        let config = SalvageConfig::new()
            .with_window(16)
            .with_anchor(WindowAnchor::Stream)
            .with_strict_terminator(true);
        assert_eq!(config.window.get(), 16);
        assert_eq!(config.anchor, WindowAnchor::Stream);
        assert!(config.strict_terminator);
    }
}
