//! Per-connection task.
//!
//! One task per client: frame the socket into lines, feed each line through
//! the router, and drain the session's outbox back onto the wire. However
//! the loop ends (clean exit, EOF, read or write error), the teardown
//! cascade runs exactly once on the way out.

use crate::config::LimitsConfig;
use crate::router::{LoopAction, Router, SessionState};
use crate::state::Relay;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

pub async fn run_connection(
    relay: Arc<Relay>,
    router: Arc<Router>,
    stream: TcpStream,
    addr: SocketAddr,
    limits: LimitsConfig,
) {
    let (handle, mut outbox_rx) = relay.attach_session(limits.outbox_depth);
    let id = handle.id;
    info!(session = %id, %addr, sessions = relay.session_count(), "Client connected");

    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(limits.max_line_len));
    let mut state = SessionState::Unregistered;
    router.greet(&handle);

    let mut reason = "client disconnected";

    loop {
        // Another session's delivery failure may have torn us down already;
        // don't keep serving a detached session.
        if !relay.is_attached(id) {
            reason = "session removed";
            break;
        }

        tokio::select! {
            inbound = framed.next() => match inbound {
                Some(Ok(line)) => {
                    match router.handle_line(&mut state, &handle, &line) {
                        LoopAction::Continue => {}
                        LoopAction::Disconnect => {
                            reason = "client exit";
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(session = %id, error = %e, "Read error");
                    reason = "read error";
                    break;
                }
                None => break,
            },

            queued = outbox_rx.recv() => match queued {
                Some(text) => {
                    if let Err(e) = framed.send(text).await {
                        debug!(session = %id, error = %e, "Write error");
                        reason = "write error";
                        break;
                    }
                }
                None => {
                    reason = "session removed";
                    break;
                }
            },
        }
    }

    // Flush whatever was queued before the cascade announces our departure.
    while let Ok(text) = outbox_rx.try_recv() {
        if framed.send(text).await.is_err() {
            break;
        }
    }

    relay.teardown_session(id, reason);
    info!(session = %id, %addr, reason, "Client disconnected");
}
