use crate::generator::profile::{build_log_from_config, GeneratorConfig};
use crate::gui_bridge::model::VisualizationModel;
use crate::workflow::runner::{Runner, WorkflowResult};
use anyhow::{Context, Result};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{mpsc, Arc, PoisonError, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, hyper::body::Bytes, Filter};

/// Largest log accepted by `POST /ingest`.
const MAX_UPLOAD_BYTES: u64 = 256 * 1024 * 1024;

type SharedModel = Arc<RwLock<VisualizationModel>>;

#[derive(Debug)]
struct WarpError;

impl warp::reject::Reject for WarpError {}

fn store(state: &SharedModel, model: VisualizationModel) {
    let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
    *guard = model;
}

fn ingest_reply(result: &WorkflowResult) -> serde_json::Value {
    json!({
        "status": "ok",
        "source": result.source,
        "records": result.analysis.metrics.records_decoded,
        "anomalies_detected": result.analysis.result.any_detected(),
    })
}

/// Runs decoding or synthesis on the blocking pool so the bridge keeps
/// answering other requests meanwhile.
async fn run_blocking<F>(task: F) -> Result<WorkflowResult>
where
    F: FnOnce() -> Result<WorkflowResult> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .context("analysis task did not complete")?
}

/// `GET /analysis`, `POST /ingest` (raw log bytes) and `POST /ingest-config`
/// (a generator config to synthesize and analyze).
pub fn routes(
    state: SharedModel,
    runner: Arc<Runner>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());
    let runner_filter = warp::any().map(move || runner.clone());

    let get_route = warp::path("analysis")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: SharedModel| {
            let guard = state.read().unwrap_or_else(PoisonError::into_inner);
            warp::reply::json(&*guard)
        });

    let post_route = warp::path("ingest")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_UPLOAD_BYTES))
        .and(warp::body::bytes())
        .and(state_filter.clone())
        .and(runner_filter.clone())
        .and_then(
            |body: Bytes, state: SharedModel, runner: Arc<Runner>| async move {
                match run_blocking(move || runner.execute_bytes("upload", &body)).await {
                    Ok(result) => {
                        store(&state, VisualizationModel::from(&result));
                        Ok::<_, warp::Rejection>(warp::reply::with_status(
                            warp::reply::json(&ingest_reply(&result)),
                            StatusCode::OK,
                        ))
                    }
                    Err(err) => {
                        log::error!("ingest error: {:#}", err);
                        Err(warp::reject::custom(WarpError))
                    }
                }
            },
        );

    let generator_route = warp::path("ingest-config")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(state_filter)
        .and(runner_filter)
        .and_then(
            |config: GeneratorConfig, state: SharedModel, runner: Arc<Runner>| async move {
                let source = config
                    .scenario
                    .clone()
                    .unwrap_or_else(|| "generated".to_string());
                let description = config.description.clone().unwrap_or_default();
                let task_source = source.clone();
                let outcome = run_blocking(move || {
                    let bytes = build_log_from_config(&config)?;
                    runner.execute_bytes(&task_source, &bytes)
                })
                .await;
                match outcome {
                    Ok(result) => {
                        store(&state, VisualizationModel::from(&result));
                        log::info!(
                            "scenario {} -> anomalies detected: {}",
                            source,
                            result.analysis.result.any_detected()
                        );
                        let mut reply = ingest_reply(&result);
                        reply["description"] = json!(description);
                        Ok::<_, warp::Rejection>(warp::reply::with_status(
                            warp::reply::json(&reply),
                            StatusCode::OK,
                        ))
                    }
                    Err(err) => {
                        log::error!("ingest-config error: {:#}", err);
                        Err(warp::reject::custom(WarpError))
                    }
                }
            },
        );

    get_route.or(post_route).or(generator_route)
}

/// Hosts the HTTP endpoint on its own thread and holds the latest model.
pub struct GuiBridge {
    state: SharedModel,
    local_addr: SocketAddr,
}

impl GuiBridge {
    pub fn new(runner: Arc<Runner>, address: SocketAddr) -> Result<Self> {
        let state = Arc::new(RwLock::new(VisualizationModel::default()));
        let filters = routes(state.clone(), runner);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<SocketAddr, String>>();

        thread::spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = ready_tx.send(Err(format!("building bridge runtime: {}", err)));
                    return;
                }
            };
            runtime.block_on(async move {
                match warp::serve(filters).try_bind_ephemeral(address) {
                    Ok((bound, server)) => {
                        let _ = ready_tx.send(Ok(bound));
                        server.await;
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(format!("binding {}: {}", address, err)));
                    }
                }
            });
        });

        let local_addr = ready_rx
            .recv()
            .context("HTTP bridge thread exited before binding")?
            .map_err(anyhow::Error::msg)?;
        log::info!("HTTP bridge listening on {}", local_addr);

        Ok(Self { state, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn publish(&self, model: &VisualizationModel) -> Result<()> {
        store(&self.state, model.clone());
        log::info!(
            "published {}: {} battery samples, anomalies detected: {}",
            model.source.as_deref().unwrap_or("<unnamed>"),
            model.telemetry.battery_voltage.len(),
            model.result.any_detected()
        );
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        println!("[bridge] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> VisualizationModel {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::build_log;
    use crate::workflow::config::WorkflowConfig;

    fn runner() -> Arc<Runner> {
        Arc::new(Runner::new(WorkflowConfig::default()).unwrap())
    }

    #[test]
    fn gui_bridge_updates_state() {
        let runner = runner();
        let gui = GuiBridge::new(runner.clone(), SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        assert_ne!(gui.local_addr().port(), 0);

        let result = runner
            .execute_bytes("bench", &build_log(2.0, 10.0).unwrap())
            .unwrap();
        gui.publish(&VisualizationModel::from(&result)).unwrap();

        let snapshot = gui.snapshot();
        assert_eq!(snapshot.source.as_deref(), Some("bench"));
        assert_eq!(snapshot.telemetry.battery_voltage.len(), 20);
        assert!(snapshot.summary.is_some());
    }

    #[tokio::test]
    async fn ingest_replaces_the_served_model() {
        let state = SharedModel::default();
        let filters = routes(state.clone(), runner());

        let initial = warp::test::request()
            .method("GET")
            .path("/analysis")
            .reply(&filters)
            .await;
        assert_eq!(initial.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(initial.body()).unwrap();
        assert!(body["source"].is_null());

        let upload = warp::test::request()
            .method("POST")
            .path("/ingest")
            .body(build_log(3.0, 10.0).unwrap())
            .reply(&filters)
            .await;
        assert_eq!(upload.status(), StatusCode::OK);
        let reply: serde_json::Value = serde_json::from_slice(upload.body()).unwrap();
        assert_eq!(reply["records"], 150);

        let latest = warp::test::request()
            .method("GET")
            .path("/analysis")
            .reply(&filters)
            .await;
        let body: serde_json::Value = serde_json::from_slice(latest.body()).unwrap();
        assert_eq!(body["source"], "upload");
        assert_eq!(body["telemetry"]["battery_voltage"].as_array().unwrap().len(), 30);
        assert_eq!(body["result"]["voltage_sag"]["detected"], false);
    }

    #[tokio::test]
    async fn oversized_scenario_is_rejected_without_touching_state() {
        let state = SharedModel::default();
        let filters = routes(state.clone(), runner());

        let response = warp::test::request()
            .method("POST")
            .path("/ingest-config")
            .json(&json!({ "duration_s": 4e8 }))
            .reply(&filters)
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.read().unwrap().source.is_none());

        let still_serving = warp::test::request()
            .method("GET")
            .path("/analysis")
            .reply(&filters)
            .await;
        assert_eq!(still_serving.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ingest_config_synthesizes_a_scenario() {
        let state = SharedModel::default();
        let filters = routes(state.clone(), runner());

        let response = warp::test::request()
            .method("POST")
            .path("/ingest-config")
            .json(&json!({
                "duration_s": 10.0,
                "sag_voltage": 6.2,
                "scenario": "brownout",
                "description": "pack failing under load"
            }))
            .reply(&filters)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let reply: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(reply["anomalies_detected"], true);
        assert_eq!(reply["description"], "pack failing under load");

        let model = state.read().unwrap().clone();
        assert_eq!(model.source.as_deref(), Some("brownout"));
        assert_eq!(model.result.voltage_sag().unwrap().count, 5);
    }

    #[tokio::test]
    async fn garbage_upload_is_an_empty_flight() {
        let filters = routes(SharedModel::default(), runner());
        let response = warp::test::request()
            .method("POST")
            .path("/ingest")
            .body(vec![0u8; 64])
            .reply(&filters)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let reply: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(reply["records"], 0);
        assert_eq!(reply["anomalies_detected"], false);
    }
}
