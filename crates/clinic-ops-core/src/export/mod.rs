//! Report exports.

mod daily;

pub use daily::*;
