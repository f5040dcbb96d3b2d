pub mod health;
pub mod line;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /config                     line configuration
/// /live                       last published snapshot
/// /process/{name}             one process of the last snapshot
/// /stats                      scheduler statistics
/// /refresh                    run one tick now (POST)
/// /polling                    polling state
/// /polling/start              start polling (POST)
/// /polling/stop               stop polling (POST)
/// ```
///
/// `/health` and `/ws` are mounted at the root by [`crate::app::build_app`].
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(line::router())
}
