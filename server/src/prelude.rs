pub use crate::app::App;
pub use gatekeeper_core::prelude::*;

// vim: ts=4
