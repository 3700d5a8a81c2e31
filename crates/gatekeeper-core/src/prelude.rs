pub use crate::error::{Error, GkResult};
pub use crate::types::ClientId;

pub use tracing::{debug, error, info, warn};

// vim: ts=4
