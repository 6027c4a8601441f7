//! Live follow of log files over a minimal WebSocket.
//!
//! The server only ever sends unmasked binary frames and never parses what
//! the client sends; inbound bytes merely tell us the peer is still there.
//!
//! ```text
//! AwaitingUpgrade ──(websocket + readable file)──▶ Handshaking
//!        │                                             │ 101 sent
//!        └──(anything else: 403)──▶ Closed ◀──spawn failed──┤
//!                                     ▲                 ▼
//!                                     └──either side ends── Streaming
//! ```

mod frame;
mod handler;
mod handshake;
mod session;

pub use frame::{encode_binary_frame, frame_header};
pub use handler::{is_upgrade_request, upgrade};
pub use handshake::{accept_key, WEBSOCKET_GUID};
pub use session::{spawn_follow, SessionEnd, TailSession};
