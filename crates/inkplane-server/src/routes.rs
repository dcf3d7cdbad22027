//! HTTP and WebSocket surface of the canvas service.
//!
//! Identity is supplied by the upstream auth layer in the `x-user-id` and
//! `x-user-name` headers; requests without them are anonymous.

use crate::error::ApiError;
use crate::service::{CanvasService, Principal};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use inkplane_core::protocol::{
    AdmissionStatus, BatchCreated, BatchRequest, DeletedCount, ServerMessage, StrokeCreated,
    UpdateResult,
};
use inkplane_core::{NewStroke, ServiceError, Stroke, StrokeId, StrokePatch};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Optional caller identity taken from request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaybePrincipal(pub Option<Principal>);

impl<S: Send + Sync> FromRequestParts<S> for MaybePrincipal {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let principal = header(USER_ID_HEADER).map(|id| Principal::new(id, header(USER_NAME_HEADER)));
        Ok(MaybePrincipal(principal))
    }
}

/// Build the application router.
pub fn router(service: Arc<CanvasService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/strokes", get(list_strokes).post(create_stroke).delete(delete_all_strokes))
        .route("/strokes/batch", post(create_strokes_batch))
        .route("/strokes/orphans", delete(delete_orphan_strokes))
        .route("/strokes/{id}", patch(update_stroke))
        .route("/admission", get(admission_status))
        .with_state(service)
}

async fn index() -> &'static str {
    "Inkplane stroke server - REST at /strokes, live snapshots at /ws"
}

async fn health() -> &'static str {
    "ok"
}

/// Run a service call on the blocking pool; repository writes hit the disk.
async fn run_blocking<T, F>(service: Arc<CanvasService>, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&CanvasService) -> Result<T, ServiceError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .map_err(|e| ServiceError::Storage(format!("Worker task failed: {}", e)))?
        .map_err(ApiError::from)
}

async fn list_strokes(State(service): State<Arc<CanvasService>>) -> Result<Json<Vec<Stroke>>, ApiError> {
    Ok(Json(run_blocking(service, |s| s.list_strokes()).await?))
}

async fn create_stroke(
    State(service): State<Arc<CanvasService>>,
    MaybePrincipal(principal): MaybePrincipal,
    Json(body): Json<NewStroke>,
) -> Result<Json<StrokeCreated>, ApiError> {
    let id = run_blocking(service, move |s| s.create_stroke(principal.as_ref(), body)).await?;
    Ok(Json(StrokeCreated { id }))
}

async fn create_strokes_batch(
    State(service): State<Arc<CanvasService>>,
    MaybePrincipal(principal): MaybePrincipal,
    Json(body): Json<BatchRequest>,
) -> Result<Json<BatchCreated>, ApiError> {
    let created =
        run_blocking(service, move |s| s.create_strokes_batch(principal.as_ref(), body.strokes)).await?;
    Ok(Json(created))
}

async fn update_stroke(
    State(service): State<Arc<CanvasService>>,
    MaybePrincipal(principal): MaybePrincipal,
    Path(id): Path<StrokeId>,
    Json(body): Json<StrokePatch>,
) -> Result<Json<UpdateResult>, ApiError> {
    let result = run_blocking(service, move |s| s.update_stroke(principal.as_ref(), id, body)).await?;
    Ok(Json(result))
}

async fn delete_all_strokes(State(service): State<Arc<CanvasService>>) -> Result<Json<DeletedCount>, ApiError> {
    Ok(Json(run_blocking(service, |s| s.delete_all_strokes()).await?))
}

async fn delete_orphan_strokes(
    State(service): State<Arc<CanvasService>>,
) -> Result<Json<DeletedCount>, ApiError> {
    Ok(Json(run_blocking(service, |s| s.delete_orphan_strokes()).await?))
}

/// `null` for anonymous callers.
async fn admission_status(
    State(service): State<Arc<CanvasService>>,
    MaybePrincipal(principal): MaybePrincipal,
) -> Json<Option<AdmissionStatus>> {
    Json(service.admission_status(principal.as_ref()))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(service): State<Arc<CanvasService>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, service))
}

/// What a change notification means for one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Push {
    Snapshot,
    Close,
}

fn push_for(change: Result<u64, RecvError>) -> Push {
    match change {
        // Skipped notifications are covered by the next full snapshot.
        Ok(_) | Err(RecvError::Lagged(_)) => Push::Snapshot,
        Err(RecvError::Closed) => Push::Close,
    }
}

/// Push a snapshot on connect and after every change until the client leaves.
async fn handle_socket(socket: WebSocket, service: Arc<CanvasService>) {
    let conn_id = Uuid::new_v4();
    info!("New subscriber: {}", conn_id);

    let (mut sender, mut receiver) = socket.split();
    let mut changes = service.subscribe();

    if send_snapshot(&mut sender, &service).await.is_ok() {
        loop {
            tokio::select! {
                msg = receiver.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        // Subscribers only listen
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("WebSocket error for {}: {}", conn_id, e);
                            break;
                        }
                    }
                }
                change = changes.recv() => {
                    if push_for(change) == Push::Close
                        || send_snapshot(&mut sender, &service).await.is_err()
                    {
                        break;
                    }
                }
            }
        }
    }
    info!("Subscriber closed: {}", conn_id);
}

async fn send_snapshot(
    sender: &mut SplitSink<WebSocket, Message>,
    service: &Arc<CanvasService>,
) -> Result<(), axum::Error> {
    let service = service.clone();
    let message = match tokio::task::spawn_blocking(move || snapshot_message(&service)).await {
        Ok(message) => message,
        Err(e) => ServerMessage::Error { message: format!("Worker task failed: {}", e) },
    };
    match serde_json::to_string(&message) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("Failed to encode snapshot: {}", e);
            Ok(())
        }
    }
}

fn snapshot_message(service: &CanvasService) -> ServerMessage {
    let revision = service.revision();
    match service.list_strokes() {
        Ok(strokes) => ServerMessage::Snapshot { revision, strokes },
        Err(e) => ServerMessage::Error { message: e.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repository::MemoryStrokeRepository;
    use crate::service::ServiceLimits;
    use axum::http::Request;
    use inkplane_core::HexColor;
    use kurbo::Point;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite;

    fn service() -> Arc<CanvasService> {
        Arc::new(CanvasService::new(
            ServiceLimits::default(),
            Arc::new(MemoryStrokeRepository::new()),
            Arc::new(ManualClock::new(5_000)),
        ))
    }

    fn ada() -> MaybePrincipal {
        MaybePrincipal(Some(Principal::new("u1", Some("ada".to_string()))))
    }

    fn line() -> NewStroke {
        NewStroke::new(vec![Point::ZERO, Point::new(4.0, 4.0)], HexColor::default(), 2.0)
    }

    async fn principal_from(headers: &[(&str, &str)]) -> MaybePrincipal {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        MaybePrincipal::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_principal_from_headers() {
        assert_eq!(principal_from(&[]).await, MaybePrincipal(None));
        assert_eq!(
            principal_from(&[(USER_ID_HEADER, "u1")]).await,
            MaybePrincipal(Some(Principal::new("u1", None)))
        );
        assert_eq!(
            principal_from(&[(USER_ID_HEADER, "u1"), (USER_NAME_HEADER, " ada ")]).await,
            MaybePrincipal(Some(Principal::new("u1", Some("ada".to_string()))))
        );
        assert_eq!(principal_from(&[(USER_ID_HEADER, "  ")]).await, MaybePrincipal(None));
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let svc = service();
        let Json(created) = create_stroke(State(svc.clone()), ada(), Json(line())).await.unwrap();
        let Json(strokes) = list_strokes(State(svc)).await.unwrap();
        assert_eq!(strokes.len(), 1);
        assert_eq!(strokes[0].id, created.id);
    }

    #[tokio::test]
    async fn test_anonymous_create_is_rejected() {
        let err = create_stroke(State(service()), MaybePrincipal(None), Json(line()))
            .await
            .unwrap_err();
        assert_eq!(err.0, ServiceError::Unauthenticated);
    }

    #[tokio::test]
    async fn test_batch_and_update_routes() {
        let svc = service();
        let body = BatchRequest { strokes: vec![line(), line()] };
        let Json(created) = create_strokes_batch(State(svc.clone()), ada(), Json(body)).await.unwrap();
        assert_eq!(created.count, 2);

        let patch = StrokePatch { color: None, width: Some(8.0) };
        let Json(result) = update_stroke(State(svc.clone()), ada(), Path(created.ids[0]), Json(patch))
            .await
            .unwrap();
        assert!(result.success);

        let Json(status) = admission_status(State(svc), ada()).await;
        assert_eq!(status.map(|s| s.used), Some(2.5));
    }

    #[tokio::test]
    async fn test_admission_is_null_when_anonymous() {
        let Json(status) = admission_status(State(service()), MaybePrincipal(None)).await;
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn test_delete_routes() {
        let svc = service();
        create_stroke(State(svc.clone()), ada(), Json(line())).await.unwrap();
        let Json(orphans) = delete_orphan_strokes(State(svc.clone())).await.unwrap();
        assert_eq!(orphans.deleted_count, 0);
        let Json(all) = delete_all_strokes(State(svc)).await.unwrap();
        assert_eq!(all.deleted_count, 1);
    }

    #[test]
    fn test_snapshot_message_carries_revision() {
        let svc = service();
        svc.create_stroke(Some(&Principal::new("u1", Some("ada".into()))), line()).unwrap();
        match snapshot_message(&svc) {
            ServerMessage::Snapshot { revision, strokes } => {
                assert_eq!(revision, 1);
                assert_eq!(strokes.len(), 1);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_push_for_change() {
        assert_eq!(push_for(Ok(4)), Push::Snapshot);
        assert_eq!(push_for(Err(RecvError::Lagged(12))), Push::Snapshot);
        assert_eq!(push_for(Err(RecvError::Closed)), Push::Close);
    }

    async fn serve(svc: Arc<CanvasService>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(svc)).await });
        format!("ws://{}/ws", addr)
    }

    /// Next snapshot as `(revision, stroke count)`.
    async fn next_snapshot<S>(ws: &mut S) -> (u64, usize)
    where
        S: futures_util::Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("no message within 5s")
                .expect("socket closed")
                .unwrap();
            if let tungstenite::Message::Text(text) = msg {
                match serde_json::from_str::<ServerMessage>(text.as_str()).unwrap() {
                    ServerMessage::Snapshot { revision, strokes } => return (revision, strokes.len()),
                    other => panic!("unexpected message: {:?}", other),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_ws_sends_snapshot_on_connect_and_after_change() {
        let svc = service();
        let url = serve(svc.clone()).await;
        let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        assert_eq!(next_snapshot(&mut ws).await, (0, 0));
        let writer = Principal::new("u1", Some("ada".into()));
        svc.create_stroke(Some(&writer), line()).unwrap();
        assert_eq!(next_snapshot(&mut ws).await, (1, 1));
    }

    #[tokio::test]
    async fn test_ws_resyncs_after_missed_changes() {
        let svc = service();
        let url = serve(svc.clone()).await;
        let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        assert_eq!(next_snapshot(&mut ws).await, (0, 0));

        // More changes than the notification channel holds, without yielding.
        let writer = Principal::new("u1", Some("ada".into()));
        for _ in 0..200 {
            svc.create_stroke(Some(&writer), line()).unwrap();
        }
        loop {
            let (revision, count) = next_snapshot(&mut ws).await;
            assert_eq!(count as u64, revision);
            if revision == 200 {
                break;
            }
        }
    }
}
