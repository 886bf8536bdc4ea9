//! Built-in functionality
//!
//! Methods installed on the root object, and the JSON snapshot utility
//! that builds on own enumerable data.

pub mod json;
pub mod object;
