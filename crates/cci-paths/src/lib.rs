//! Typed path handling for the cache-item engine.
//!
//! Three disjoint nominal types prevent silent mixing of path flavors:
//! [`AbsoluteSystemPath`] (known absolute, native separators),
//! [`AnchoredSystemPath`] (known relative to an anchor, native separators),
//! and [`AnchoredUpstreamPath`] (relative, forward slashes, trailing slash
//! marks a directory -- the form stored in tar headers). Conversions
//! between them are total functions; none of them touch the filesystem.

mod absolute_system_path;
mod absolute_system_path_buf;
mod anchored_system_path;
mod anchored_system_path_buf;
mod anchored_upstream_path;
mod error;
mod lexical_clean;

pub use absolute_system_path::AbsoluteSystemPath;
pub use absolute_system_path_buf::AbsoluteSystemPathBuf;
pub use anchored_system_path::AnchoredSystemPath;
pub use anchored_system_path_buf::AnchoredSystemPathBuf;
pub use anchored_upstream_path::{AnchoredUpstreamPath, AnchoredUpstreamPathBuf};
pub use error::PathError;
pub use lexical_clean::lexical_clean;
