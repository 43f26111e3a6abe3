use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use plate_cutter::instance::default_plates;
use plate_cutter::{Batch, Constraints, NodeRecord, Plate, SolveError, Solver, Stack, Strategy};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct SolveRequest {
    /// Plates in the order they may be used; defaults to defect-free plates.
    #[serde(default)]
    plates: Option<Vec<Plate>>,
    stacks: Vec<Stack>,
    #[serde(default)]
    strategy: Strategy,
    #[serde(default)]
    constraints: Constraints,
    #[serde(default)]
    first_node_id: u32,
}

#[derive(Serialize)]
struct SolveResponse {
    nodes: Vec<NodeRecord>,
    plate_count: usize,
    item_area: u64,
    waste_area: u64,
    leftover_area: u64,
    waste_percent: f64,
    next_node_id: u32,
    wide_first_cuts: Vec<u32>,
}

fn status_for(err: &SolveError) -> StatusCode {
    match err {
        SolveError::OutOfPlates { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SolveError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
    }
}

async fn solve(Json(req): Json<SolveRequest>) -> Result<Json<SolveResponse>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /solve"
    );

    for stack in &req.stacks {
        if let Some(item) = stack.items.iter().find(|i| i.width == 0 || i.length == 0) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("item {} in stack {} has a zero dimension", item.id, stack.id),
            ));
        }
    }

    let constraints = req.constraints;
    let plates = req.plates.unwrap_or_else(|| default_plates(&constraints));
    let solver = Solver::new(plates, constraints)
        .with_strategy(req.strategy)
        .with_first_node_id(req.first_node_id);
    let batch = Batch::new(req.stacks);

    let solution = tokio::task::spawn_blocking(move || solver.solve(batch))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| (status_for(&e), e.to_string()))?;

    Ok(Json(SolveResponse {
        nodes: solution.records(),
        plate_count: solution.plate_count(),
        item_area: solution.item_area(),
        waste_area: solution.waste_area(),
        leftover_area: solution.leftover_area(),
        waste_percent: solution.waste_percent(),
        next_node_id: solution.next_node_id(),
        wide_first_cuts: solution.wide_first_cuts(constraints.max_1_cut),
    }))
}

#[tokio::main]
async fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init(sentry::ClientOptions {
            dsn: dsn.parse().ok(),
            release: sentry::release_name!(),
            ..Default::default()
        })
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/solve", post(solve))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
