use std::time::Duration;

/// Port assumed when a hub address does not carry one.
pub const DEFAULT_PORT: u16 = 2468;

/// Path of the one-time-password enrollment endpoint, relative to the hub url.
pub const OTP_AUTHENTICATE_PATH: &str = "/api/v1/node/otp-authenticate";

/// Path of the event stream endpoint, relative to the hub url.
pub const STREAM_PATH: &str = "/api/v1/node/stream";

/// Query parameter carrying the device secret on the stream endpoint.
pub const STREAM_TOKEN_PARAM: &str = "token";

/// Timeout for the enrollment HTTP request.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Fixed delay between stream reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Time allowed for the WebSocket opening handshake.
pub const WS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed to deliver a close frame when shutting a stream down.
pub const WS_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum inbound WebSocket message size in bytes (16 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
