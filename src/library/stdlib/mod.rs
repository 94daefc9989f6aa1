//! Native standard libraries

pub mod arrays;
pub mod debug;
pub mod json;
pub mod math;
pub mod objects;
pub mod strings;

use super::Library;

/// Every native library, in registration order
pub static LIBRARIES: &[&Library] = &[
    &math::LIBRARY,
    &strings::LIBRARY,
    &arrays::LIBRARY,
    &objects::LIBRARY,
    &json::LIBRARY,
    &debug::LIBRARY,
];
