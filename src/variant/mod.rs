//! Derived-asset resolution.
//!
//! - [`options`] normalizes the loosely typed request parameters.
//! - [`naming`] maps transforms to deterministic cache paths.
//! - [`quality`] searches the best quality under a byte budget.
//! - [`resolver`] decides which artifact answers a request and builds it.

pub mod naming;
pub mod options;
pub mod quality;
pub mod resolver;

pub use naming::{artifact_exists, write_atomic, CacheLayout, Transform, IMPORT_NAMESPACE};
pub use options::{parse_quality, RawServeParams, ServeOptions};
pub use quality::{QualityTargeter, Targeted};
pub use resolver::{target_side, Derivation, Plan, Resolved, VariantResolver};
