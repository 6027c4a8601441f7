use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use hyper_util::rt::TokioIo;
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::jail;
use crate::ws::handshake::accept_key;
use crate::ws::session::{spawn_follow, TailSession};
use crate::AppState;

/// Does the request ask to switch protocols at all?
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers.contains_key(header::UPGRADE)
}

/// Answer a WebSocket upgrade for a file and follow it once switched.
///
/// Every refusal is a bare 403. The follow process is only spawned after the
/// 101 response has gone out and the connection has been handed over.
pub async fn upgrade(state: AppState, mut req: Request) -> Result<Response, GatewayError> {
    let wants_websocket = req
        .headers()
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"));
    if !wants_websocket {
        debug!("upgrade: unsupported protocol {:?}", req.headers().get(header::UPGRADE));
        return Err(GatewayError::UpgradeRejected);
    }

    let url_path = req.uri().path().to_string();
    let resolved = jail::resolve(&url_path, &state.root_dir)
        .await
        .map_err(|err| {
            debug!("upgrade: {} rejected: {}", url_path, err);
            GatewayError::UpgradeRejected
        })?;
    if !resolved.metadata.is_file() {
        return Err(GatewayError::UpgradeRejected);
    }

    let accept = req
        .headers()
        .get(header::SEC_WEBSOCKET_KEY)
        .and_then(|value| value.to_str().ok())
        .map(accept_key)
        .ok_or(GatewayError::UpgradeRejected)?;

    let on_upgrade = hyper::upgrade::on(&mut req);
    let path = resolved.request.absolute;
    let label = resolved.request.relative.display().to_string();

    tokio::spawn(async move {
        let upgraded = match on_upgrade.await {
            Ok(upgraded) => upgraded,
            Err(err) => {
                warn!("upgrade: connection for {} not handed over: {}", label, err);
                return;
            }
        };

        let child = match spawn_follow(&state.config, &path) {
            Ok(child) => child,
            Err(err) => {
                error!(
                    "close websocket for {} {}: process failed to spawn: {}",
                    state.config.follow_program, label, err
                );
                return;
            }
        };

        info!(
            "launch {} {} process {:?} for websocket connection",
            state.config.follow_program,
            label,
            child.id()
        );

        let session = TailSession::new(
            TokioIo::new(upgraded),
            child,
            label.clone(),
            state.config.frame_queue_depth,
        );
        let end = session.run().await;
        debug!("follow session for {} ended: {:?}", label, end);
    });

    Ok((
        StatusCode::SWITCHING_PROTOCOLS,
        [
            (header::UPGRADE, "websocket".to_string()),
            (header::CONNECTION, "Upgrade".to_string()),
            (header::SEC_WEBSOCKET_ACCEPT, accept),
        ],
    )
        .into_response())
}
