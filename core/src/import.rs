//! Turning raw exported documents into stored rows.
//!
//! [`linearize`] is the pure tree-to-rows transformation; [`Loader`] decides
//! which sources need re-importing and replaces each affected document
//! atomically.

mod linearizer;
mod loader;
mod raw;
mod source;

pub use linearizer::linearize;
pub use loader::{DocumentOutcome, ImportStatus, ImportSummary, Loader, RefreshState};
pub use raw::{RawChild, RawDocument, RawNode};
pub use source::{SourceDir, SourceDocument, FILENAMES_INDEX, SOURCE_SUFFIX};
