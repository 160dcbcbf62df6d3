//! Prometheus recorder for the session counters
//!
//! The pipeline emits `session_refresh_total`, `session_sign_out_total` and
//! `session_retry_total` through the `metrics` facade. The CLI installs a
//! recorder so they can be rendered with `--metrics` when a command ends.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
