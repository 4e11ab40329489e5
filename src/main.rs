use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;

use mapfilter::{
    ApplicationCoordinator, Crs, Dispatcher, FilterConfig, InteractionController,
    InteractionHandle, InteractionState, LocalEvaluationSink, OperatorSpec, QueryPayload,
    QueryTransport, RemoteQuerySink, Reproject, Shape, SinkFailure, WebMercator,
};

/// Scripted session replayed by the binary
#[derive(Debug, Deserialize)]
struct Scenario {
    /// CRS shapes are drawn in; the configured view projection by default
    #[serde(default)]
    crs: Option<Crs>,
    /// CRS of the features file
    #[serde(default = "Crs::wgs84")]
    features_crs: Crs,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Step {
    Operator {
        kind: String,
        operand: String,
        #[serde(default)]
        distance: Option<f64>,
    },
    Draw { operator: usize, wkt: String },
    Translate { operator: usize, wkt: String },
    TranslateEnd { operator: usize, wkt: String },
    Remove { operator: usize },
    Clear,
}

/// Logs every query the dispatcher sends
struct LogTransport {
    name: &'static str,
    config: FilterConfig,
}

impl QueryTransport for LogTransport {
    fn send(&self, payload: QueryPayload) -> BoxFuture<'static, anyhow::Result<()>> {
        let message = match &payload {
            QueryPayload::Text(cql) => format!(
                "GET {} CQL_FILTER={}",
                self.config.layer.wms_url(),
                cql.as_deref().unwrap_or("<none>")
            ),
            QueryPayload::Document(doc) => format!(
                "POST {} {}",
                self.config.layer.wfs_url(),
                mapfilter::serialize::get_feature_body(
                    &self.config.layer,
                    doc.as_ref(),
                    self.config.decimals
                )
            ),
        };
        let name = self.name;
        async move {
            log::info!("[{name}] {message}");
            Ok(())
        }
        .boxed()
    }
}

struct Operator {
    controller: InteractionController,
    handle: Option<InteractionHandle>,
}

fn usage() -> ! {
    eprintln!("usage: mapfilter <scenario.json> [features.geojson]");
    std::process::exit(2);
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args = std::env::args().skip(1);
    let Some(scenario_path) = args.next().map(PathBuf::from) else {
        usage();
    };
    let features_path = args.next().map(PathBuf::from);

    let config = FilterConfig::load();
    let scenario = read_scenario(&scenario_path)?;
    run(&config, scenario, features_path.as_deref()).await
}

fn read_scenario(path: &Path) -> Result<Scenario> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse scenario: {}", path.display()))
}

async fn run(config: &FilterConfig, scenario: Scenario, features: Option<&Path>) -> Result<()> {
    let reprojector: Arc<dyn Reproject> = Arc::new(WebMercator);
    let crs = scenario
        .crs
        .clone()
        .unwrap_or_else(|| config.layer.view_projection.clone());

    let local = match features {
        Some(path) => {
            let geojson = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read features: {}", path.display()))?;
            LocalEvaluationSink::from_geojson("features", &geojson, &scenario.features_crs, reprojector.clone())?
        }
        None => LocalEvaluationSink::new("features", Vec::new(), reprojector.clone()),
    };
    let tiles = RemoteQuerySink::text("tiles", config, reprojector.clone());
    let wfs = RemoteQuerySink::structured("wfs", config, reprojector.clone());

    let dispatchers = [
        Dispatcher::spawn(
            tiles.subscribe(),
            Arc::new(LogTransport {
                name: "tiles",
                config: config.clone(),
            }),
        ),
        Dispatcher::spawn(
            wfs.subscribe(),
            Arc::new(LogTransport {
                name: "wfs",
                config: config.clone(),
            }),
        ),
    ];

    let mut coordinator = ApplicationCoordinator::new(crs.clone(), reprojector)
        .with_circle_segments(config.circle_segments);
    let local = coordinator.add_sink(local);
    let tiles = coordinator.add_sink(tiles);
    let wfs = coordinator.add_sink(wfs);

    let mut operators: Vec<Operator> = Vec::new();
    for (index, step) in scenario.steps.into_iter().enumerate() {
        let terminal = !matches!(step, Step::Operator { .. } | Step::Translate { .. });
        let mut failures = apply_step(&mut coordinator, &mut operators, step, &crs)
            .with_context(|| format!("Step {index} failed"))?;
        failures.extend(coordinator.drain());

        for failure in failures {
            eprintln!("step {index}: sink {} failed: {}", failure.name, failure.error);
        }

        if terminal {
            let tree = coordinator.tree();
            println!("step {index}: {} filter group(s)", tree.len());
            if let Some(sink) = coordinator.sink::<RemoteQuerySink>(tiles) {
                let cql = sink.tile_params().get("CQL_FILTER");
                println!("  cql: {}", cql.map(String::as_str).unwrap_or("<none>"));
            }
            if let Some(sink) = coordinator.sink::<RemoteQuerySink>(wfs) {
                if let Some(QueryPayload::Document(doc)) = sink.last_payload() {
                    let json = match doc {
                        Some(doc) => doc.to_json()?,
                        None => "<none>".to_string(),
                    };
                    println!("  document: {json}");
                }
            }
            if let Some(sink) = coordinator.sink::<LocalEvaluationSink>(local) {
                println!("  visible: [{}]", sink.visible_ids().join(", "));
            }
            for (id, overlay) in coordinator.overlays() {
                if let Some(buffer) = &overlay.buffer {
                    println!("  overlay {id}: buffer of {} vertices", buffer.exterior().0.len());
                }
            }
        }

        tokio::task::yield_now().await;
    }

    drop(coordinator);
    for dispatcher in dispatchers {
        dispatcher.await.context("Dispatcher task failed")?;
    }
    Ok(())
}

fn operator(operators: &mut [Operator], index: usize) -> Result<&mut Operator> {
    let count = operators.len();
    operators
        .get_mut(index)
        .with_context(|| format!("No operator {index} ({count} defined)"))
}

/// Drive the interactions for one step; returns failures of a clear
fn apply_step(
    coordinator: &mut ApplicationCoordinator,
    operators: &mut Vec<Operator>,
    step: Step,
    crs: &Crs,
) -> Result<Vec<SinkFailure>> {
    match step {
        Step::Operator {
            kind,
            operand,
            distance,
        } => {
            let spec = OperatorSpec::parse(&kind, &operand, distance)?;
            let controller = coordinator.add_operator(spec)?;
            operators.push(Operator {
                controller,
                handle: None,
            });
        }
        Step::Draw { operator: index, wkt } => {
            let shape = Shape::from_wkt(&wkt, crs.clone())?;
            let op = operator(operators, index)?;
            let handle = op
                .controller
                .finish_draw(shape, move || log::debug!("Shape of operator {index} erased"))?;
            op.handle = Some(handle);
        }
        Step::Translate { operator: index, wkt } => {
            let shape = Shape::from_wkt(&wkt, crs.clone())?;
            let op = operator(operators, index)?;
            if op.controller.state() == InteractionState::Drawn {
                op.controller.start_translate()?;
            }
            op.controller.translate(shape)?;
        }
        Step::TranslateEnd { operator: index, wkt } => {
            let shape = Shape::from_wkt(&wkt, crs.clone())?;
            let op = operator(operators, index)?;
            if op.controller.state() == InteractionState::Drawn {
                op.controller.start_translate()?;
            }
            op.controller.finish_translate(shape)?;
        }
        Step::Remove { operator: index } => {
            let op = operator(operators, index)?;
            match &op.handle {
                Some(handle) => handle.remove()?,
                None => op.controller.remove()?,
            }
        }
        Step::Clear => {
            operators.iter_mut().for_each(|op| op.handle = None);
            return Ok(coordinator.clear());
        }
    }
    Ok(Vec::new())
}
