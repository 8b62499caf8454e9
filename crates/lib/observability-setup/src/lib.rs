//! Process-global logging and trace setup for superv binaries.

mod common;

pub use self::common::*;

#[cfg_attr(feature = "trace", path = "impl.rs")]
#[cfg_attr(not(feature = "trace"), path = "fmt_only.rs")]
mod r#impl;

pub use self::r#impl::*;
