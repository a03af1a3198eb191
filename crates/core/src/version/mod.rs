//! Version numbers, ranges, descriptors and matching.

mod concrete;
mod descriptor;
mod matcher;
mod range;

pub use concrete::ConcreteVersion;
pub use descriptor::VersionDescriptor;
pub use matcher::{Resolved, VersionMatcher};
pub use range::VersionRange;
