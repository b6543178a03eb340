//! Connection descriptor: the raw connection string plus `builder:` overrides,
//! resolved into canonical keywords.

pub mod descriptor;
pub mod keywords;

pub use descriptor::{ConnectionDescriptor, PASSWORD_MASK};
pub use keywords::Keyword;
