//! Error taxonomy for the accessory runtime.

use core::fmt;

use crate::hal::IoError;
use crate::relay::RelayId;
use crate::stack::{EndpointId, StackError};

/// Static wiring mistakes detected when binding relays to endpoints.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigurationError {
    /// No endpoint is bound to the relay.
    UnknownRelay(RelayId),
    /// No relay is bound to the endpoint.
    UnknownEndpoint(EndpointId),
    /// More relays were configured than the accessory can hold.
    TooManyRelays,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::UnknownRelay(relay) => write!(f, "no binding for {relay}"),
            ConfigurationError::UnknownEndpoint(endpoint) => {
                write!(f, "no relay bound to endpoint {endpoint}")
            }
            ConfigurationError::TooManyRelays => f.write_str("relay capacity exceeded"),
        }
    }
}

/// Runtime failures surfaced by bridge operations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessoryError {
    Configuration(ConfigurationError),
    /// A single physical write failed; the relay is rewritten on the next change.
    TransientIo { relay: RelayId, error: IoError },
    /// The stack rejected a read or write.
    Protocol(StackError),
}

impl From<ConfigurationError> for AccessoryError {
    fn from(value: ConfigurationError) -> Self {
        AccessoryError::Configuration(value)
    }
}

impl From<StackError> for AccessoryError {
    fn from(value: StackError) -> Self {
        AccessoryError::Protocol(value)
    }
}

impl fmt::Display for AccessoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessoryError::Configuration(error) => write!(f, "configuration: {error}"),
            AccessoryError::TransientIo { relay, error } => write!(f, "{relay}: {error}"),
            AccessoryError::Protocol(error) => write!(f, "stack: {error}"),
        }
    }
}

/// Unrecoverable startup failures. Initialization aborts on any of these.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InitError {
    NodeCreation(StackError),
    RelayInit { relay: RelayId, error: IoError },
    EndpointBinding { relay: RelayId, error: StackError },
    DuplicateEndpoint { relay: RelayId, endpoint: EndpointId },
    StackStart(StackError),
    Configuration(ConfigurationError),
}

impl From<ConfigurationError> for InitError {
    fn from(value: ConfigurationError) -> Self {
        InitError::Configuration(value)
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::NodeCreation(error) => write!(f, "failed to create node: {error}"),
            InitError::RelayInit { relay, error } => {
                write!(f, "failed to initialise {relay}: {error}")
            }
            InitError::EndpointBinding { relay, error } => {
                write!(f, "failed to create endpoint for {relay}: {error}")
            }
            InitError::DuplicateEndpoint { relay, endpoint } => {
                write!(f, "endpoint {endpoint} issued twice ({relay})")
            }
            InitError::StackStart(error) => write!(f, "failed to start stack: {error}"),
            InitError::Configuration(error) => write!(f, "configuration: {error}"),
        }
    }
}
