//! Progress reporting callbacks.

/// Receives human readable progress lines from the driver.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, text: &str);
}

impl<F> ProgressReporter for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, text: &str) {
        self(text)
    }
}

/// Forwards progress lines to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, text: &str) {
        tracing::info!("{text}");
    }
}
