use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Log output settings
///
/// Filtering is controlled by `RUST_LOG`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// Directory for `convoy.log`; logs go to stdout when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}
