use core::fmt;

use mqttrust::encoding::v4::ConnectReturnCode;
use thiserror::Error;

/// Client session state, numbered like the Arduino PubSubClient `state()` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    ConnectionTimeout,
    ConnectionLost,
    ConnectFailed,
    Disconnected,
    Connected,
    BadProtocol,
    BadClientId,
    Unavailable,
    BadCredentials,
    Unauthorized,
}

impl SessionState {
    pub const fn code(self) -> i8 {
        match self {
            SessionState::ConnectionTimeout => -4,
            SessionState::ConnectionLost => -3,
            SessionState::ConnectFailed => -2,
            SessionState::Disconnected => -1,
            SessionState::Connected => 0,
            SessionState::BadProtocol => 1,
            SessionState::BadClientId => 2,
            SessionState::Unavailable => 3,
            SessionState::BadCredentials => 4,
            SessionState::Unauthorized => 5,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SessionState::ConnectionTimeout => "MQTT_CONNECTION_TIMEOUT",
            SessionState::ConnectionLost => "MQTT_CONNECTION_LOST",
            SessionState::ConnectFailed => "MQTT_CONNECT_FAILED",
            SessionState::Disconnected => "MQTT_DISCONNECTED",
            SessionState::Connected => "MQTT_CONNECTED",
            SessionState::BadProtocol => "MQTT_CONNECT_BAD_PROTOCOL",
            SessionState::BadClientId => "MQTT_CONNECT_BAD_CLIENT_ID",
            SessionState::Unavailable => "MQTT_CONNECT_UNAVAILABLE",
            SessionState::BadCredentials => "MQTT_CONNECT_BAD_CREDENTIALS",
            SessionState::Unauthorized => "MQTT_CONNECT_UNAUTHORIZED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.code(), self.name())
    }
}

/// Why a broker handshake did not produce a session. Diagnostic only.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    #[error("(-4) MQTT_CONNECTION_TIMEOUT")]
    Timeout,
    #[error("(-3) MQTT_CONNECTION_LOST")]
    ConnectionLost,
    #[error("(-2) MQTT_CONNECT_FAILED")]
    ConnectFailed,
    #[error("(1) MQTT_CONNECT_BAD_PROTOCOL")]
    BadProtocol,
    #[error("(2) MQTT_CONNECT_BAD_CLIENT_ID")]
    BadClientId,
    #[error("(3) MQTT_CONNECT_UNAVAILABLE")]
    Unavailable,
    #[error("(4) MQTT_CONNECT_BAD_CREDENTIALS")]
    BadCredentials,
    #[error("(5) MQTT_CONNECT_UNAUTHORIZED")]
    Unauthorized,
}

impl ConnectFailure {
    /// Maps a refused CONNACK; `None` for an accepted one.
    pub fn from_return_code(code: ConnectReturnCode) -> Option<Self> {
        match code {
            ConnectReturnCode::Accepted => None,
            ConnectReturnCode::RefusedProtocolVersion => Some(ConnectFailure::BadProtocol),
            ConnectReturnCode::RefusedIdentifierRejected => Some(ConnectFailure::BadClientId),
            ConnectReturnCode::ServerUnavailable => Some(ConnectFailure::Unavailable),
            ConnectReturnCode::BadUsernamePassword => Some(ConnectFailure::BadCredentials),
            ConnectReturnCode::NotAuthorized => Some(ConnectFailure::Unauthorized),
        }
    }

    pub const fn state(self) -> SessionState {
        match self {
            ConnectFailure::Timeout => SessionState::ConnectionTimeout,
            ConnectFailure::ConnectionLost => SessionState::ConnectionLost,
            ConnectFailure::ConnectFailed => SessionState::ConnectFailed,
            ConnectFailure::BadProtocol => SessionState::BadProtocol,
            ConnectFailure::BadClientId => SessionState::BadClientId,
            ConnectFailure::Unavailable => SessionState::Unavailable,
            ConnectFailure::BadCredentials => SessionState::BadCredentials,
            ConnectFailure::Unauthorized => SessionState::Unauthorized,
        }
    }
}

impl From<ConnectFailure> for SessionState {
    fn from(failure: ConnectFailure) -> Self {
        failure.state()
    }
}
