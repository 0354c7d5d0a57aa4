use flexi_logger::{Logger, LoggerHandle};

use crate::error::Result;

/// Starts logging to stderr. `RUST_LOG` overrides `default_level`.
///
/// Keep the returned handle alive for as long as logs should be written.
pub fn init_logger(default_level: &str) -> Result<LoggerHandle> {
    let handle = Logger::try_with_env_or_str(default_level)?
        .format(flexi_logger::colored_default_format)
        .start()?;
    Ok(handle)
}
