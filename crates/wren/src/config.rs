// NetConfig — per-net settings fixed at construction
//
// Built with `Default` plus `with_*` chaining:
//
//   let config = NetConfig::default()
//       .with_tolerance(0.05)
//       .with_load_mode(LoadMode::Strict)
//       .with_status_callback(|msg| eprintln!("{msg}"));

use std::fmt;
use std::sync::Arc;

/// Receives every status message a net emits.
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// How the weight reader treats records it does not understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Skip records with an unknown role and incomplete batch-norm blocks.
    #[default]
    Lenient,
    /// Reject them.
    Strict,
}

#[derive(Clone)]
pub struct NetConfig {
    /// Absolute error below which an output element counts as correct
    /// when `training` computes accuracy (default: 0.1).
    pub tolerance: f32,
    /// Weight-file strictness (default: lenient).
    pub load_mode: LoadMode,
    status: Option<StatusCallback>,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            tolerance: 0.1,
            load_mode: LoadMode::Lenient,
            status: None,
        }
    }
}

impl NetConfig {
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_load_mode(mut self, mode: LoadMode) -> Self {
        self.load_mode = mode;
        self
    }

    /// Install the status callback. It is called synchronously, under the
    /// net's lock, with the text of every error the net reports.
    pub fn with_status_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.status = Some(Arc::new(callback));
        self
    }

    pub(crate) fn emit_status(&self, msg: &str) {
        tracing::warn!(status = msg, "net status");
        if let Some(cb) = &self.status {
            cb(msg);
        }
    }
}

impl fmt::Debug for NetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetConfig")
            .field("tolerance", &self.tolerance)
            .field("load_mode", &self.load_mode)
            .field("status", &self.status.is_some())
            .finish()
    }
}
