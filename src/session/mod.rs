//! Live WebSocket sessions.
//!
//! A mentee session follows a single ticket; a mentor session follows the
//! whole queue. Both are plain loops over an upgraded hyper connection,
//! fed by [`NotificationHub`](crate::hub::NotificationHub) subscriptions.

pub mod mentee;
pub mod mentor;

pub use mentee::run_mentee_session;
pub use mentor::run_mentor_session;

/// WebSocket type after the hyper upgrade completes.
pub(crate) type HyperWebSocket =
    hyper_tungstenite::WebSocketStream<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>;
