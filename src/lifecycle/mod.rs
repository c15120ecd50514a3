//! Structural migrations of the header vocabulary
//!
//! Numeric attributes and units are shared by every record, so changing them
//! means rewriting records too. All operations stage their result on a clone
//! of the catalog and only swap it in once the clone validates.

pub mod attribute;
pub mod unit;

pub use attribute::{AttributeOp, AttributePlan};
