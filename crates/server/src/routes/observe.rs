// crates/server/src/routes/observe.rs
//! WebSocket observer endpoint for a single job.
//!
//! - `WS /api/jobs/{id}/ws` -- the job snapshot, then every update as it happens
//!
//! The server closes the socket (code 1000) once the job finishes. Closing
//! from the client side unsubscribes.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{close_code, CloseFrame, Message, WebSocket},
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use fintrack_jobs::{observer, Job, ObserverId};

use crate::state::AppState;

/// Protocol-level ping cadence; a failed ping ends the connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Close code sent when the requested job does not exist.
pub const CLOSE_JOB_NOT_FOUND: u16 = 4004;

/// RAII guard that detaches the observer when the connection handler ends,
/// including on panic or task cancellation.
struct ObserverGuard {
    job: Arc<Job>,
    id: ObserverId,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.job.remove_observer(self.id);
    }
}

/// Build the observer WebSocket sub-router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/jobs/{id}/ws", get(ws_job_handler))
}

/// HTTP upgrade handler. Unknown jobs get an error frame and a 4004 close.
async fn ws_job_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(job) = state.jobs.get_job(&job_id) else {
        return ws.on_upgrade(move |mut socket| async move {
            let err_msg = serde_json::json!({
                "type": "error",
                "message": format!("Job '{}' not found", job_id),
            });
            let _ = socket.send(Message::Text(err_msg.to_string().into())).await;
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_JOB_NOT_FOUND,
                    reason: "Job not found".into(),
                })))
                .await;
        });
    };

    ws.on_upgrade(move |socket| handle_job_ws(socket, job))
}

/// Forward the job's update stream to one socket until either side ends it.
async fn handle_job_ws(mut socket: WebSocket, job: Arc<Job>) {
    let (tx, mut rx) = observer::channel();
    let id = job.add_observer(tx);
    let _guard = ObserverGuard {
        job: Arc::clone(&job),
        id,
    };
    let job_id = job.id().to_string();

    tracing::info!(job_id = %job_id, observer_id = id.as_u64(), "Job observer connected");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    // Skip the first immediate tick
    heartbeat.tick().await;

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            tracing::debug!(
                                job_id = %job_id,
                                "Client disconnected during update stream"
                            );
                            return;
                        }
                    }
                    None => {
                        // The job dropped our sender: it finished.
                        let _ = socket
                            .send(Message::Close(Some(CloseFrame {
                                code: close_code::NORMAL,
                                reason: "Job finished".into(),
                            })))
                            .await;
                        tracing::info!(job_id = %job_id, "Job finished, observer closed");
                        return;
                    }
                }
            }

            client_msg = socket.recv() => {
                match client_msg {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(job_id = %job_id, "Job observer disconnected");
                        return;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(
                            job_id = %job_id,
                            error = %e,
                            "WebSocket receive error"
                        );
                        return;
                    }
                    _ => {
                        // Observers are read-only; client text, binary and pongs are ignored.
                    }
                }
            }

            _ = heartbeat.tick() => {
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    tracing::debug!(job_id = %job_id, "Client disconnected during heartbeat ping");
                    return;
                }
            }
        }
    }
}
