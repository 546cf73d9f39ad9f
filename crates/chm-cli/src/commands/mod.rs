//! CLI command implementations

pub(crate) mod common;
pub(crate) mod create;
pub(crate) mod down;
pub(crate) mod dump;
pub(crate) mod up;
