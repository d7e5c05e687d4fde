//! Bootstrap logging at "info", then reload the filter once settings are
//! parsed.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
