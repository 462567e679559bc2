use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// The recorder is process-wide; every router built in this process shares it.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once and describe the service series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE.get_or_try_init(|| {
            let handle = PrometheusBuilder::new().install_recorder()?;
            describe();
            Ok::<_, anyhow::Error>(handle)
        })?;
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("sightings_created_total", "Sightings accepted by POST /api/sightings.");
    describe_counter!("sightings_refreshed_total", "Successful still-here refreshes.");
    describe_counter!("sightings_sweep_runs_total", "Expiry sweep cycles started.");
    describe_counter!("sightings_swept_total", "Expired sightings removed by sweeps.");
    describe_counter!("sightings_sweep_errors_total", "Sweep cycles that failed.");
    describe_gauge!(
        "sightings_sweep_last_run_ts",
        "Unix ts when the expiry sweep last ran."
    );
}
