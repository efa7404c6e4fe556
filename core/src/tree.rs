//! Navigation over stored trees and markdown rendering of subtrees.
//!
//! Everything here reads from the store only. Ancestor chains come from the
//! materialized path, so breadcrumbs cost one batched lookup per node no
//! matter how large the document is.

mod markdown;
mod navigator;

pub use markdown::render_markdown;
pub use navigator::{Navigator, SubtreeNode};
