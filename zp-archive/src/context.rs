//! Logging setup and step reporting for one run.

use tracing_subscriber::EnvFilter;

/// Per-run context passed explicitly to the pipeline stages.
#[derive(Debug, Clone)]
pub struct Context {
    project: String,
}

impl Context {
    /// Install the global subscriber and return the context.
    ///
    /// `RUST_LOG` wins over the default level. A subscriber that is already
    /// installed is kept.
    pub fn init(project: impl Into<String>, debug: bool) -> Self {
        let default_level = if debug { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();

        Self::new(project)
    }

    /// A context without touching the global subscriber.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }

    pub fn step(&self, message: &str) {
        tracing::info!(project = %self.project, "{}...", message);
    }

    pub fn step_ok(&self, message: &str) {
        tracing::info!(project = %self.project, "✓ {}", message);
    }

    pub fn detail(&self, message: &str) {
        tracing::debug!(project = %self.project, "{}", message);
    }
}
