//! Protocol-stack collaborator interface.
//!
//! The commissioning/control stack owns the attribute store, fabric state and
//! commissioning windows. The accessory only talks to it through
//! [`ProtocolStack`], and stacks that deliver pre-update notifications through
//! a queue additionally implement [`InboundQueue`].

use core::fmt;
use core::time::Duration;

/// Protocol endpoint handle issued by the stack.
pub type EndpointId = u16;

/// Cluster identifier.
pub type ClusterId = u32;

/// Attribute identifier within a cluster.
pub type AttributeId = u32;

/// On/Off cluster identifier.
pub const ON_OFF_CLUSTER: ClusterId = 0x0006;

/// On/Off power attribute identifier.
pub const ON_OFF_ATTRIBUTE: AttributeId = 0x0000;

/// Identify cluster identifier.
pub const IDENTIFY_CLUSTER: ClusterId = 0x0003;

/// Fully qualified attribute address.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct AttributePath {
    pub endpoint: EndpointId,
    pub cluster: ClusterId,
    pub attribute: AttributeId,
}

impl AttributePath {
    #[must_use]
    pub const fn new(endpoint: EndpointId, cluster: ClusterId, attribute: AttributeId) -> Self {
        Self {
            endpoint,
            cluster,
            attribute,
        }
    }

    /// Path of the on/off power attribute on `endpoint`.
    #[must_use]
    pub const fn on_off(endpoint: EndpointId) -> Self {
        Self::new(endpoint, ON_OFF_CLUSTER, ON_OFF_ATTRIBUTE)
    }

    /// Returns `true` when the path names the on/off power attribute.
    #[must_use]
    pub const fn is_on_off(&self) -> bool {
        self.cluster == ON_OFF_CLUSTER && self.attribute == ON_OFF_ATTRIBUTE
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ep{}/0x{:04x}/0x{:04x}",
            self.endpoint, self.cluster, self.attribute
        )
    }
}

/// Attribute value as stored by the stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    Invalid,
}

impl AttributeValue {
    /// Returns the boolean payload, if this is a boolean value.
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(value),
            _ => None,
        }
    }
}

/// Rejection reported by the protocol stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StackError {
    /// Endpoint, cluster or attribute does not exist.
    NotFound,
    /// Stack refused the read or write.
    Rejected,
    /// Stack cannot accept more work right now.
    Busy,
    /// Value has the wrong type for the attribute.
    InvalidValue,
    /// Stack is not running or could not allocate the requested object.
    Unavailable,
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Lifecycle and connectivity events published by the stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StackEvent {
    InterfaceAddressChanged { ipv6: bool },
    CommissioningComplete,
    FailSafeTimerExpired,
    CommissioningSessionStarted,
    CommissioningSessionStopped,
    CommissioningWindowOpened,
    CommissioningWindowClosed,
    FabricWillBeRemoved,
    FabricRemoved,
    FabricUpdated,
    FabricCommitted,
}

/// Operations the accessory consumes from the commissioning/control stack.
pub trait ProtocolStack {
    /// Creates the protocol node (root endpoint included).
    fn create_node(&mut self) -> Result<(), StackError> {
        Ok(())
    }

    /// Registers an on/off endpoint with the supplied initial power value.
    fn add_on_off_endpoint(&mut self, initial: bool) -> Result<EndpointId, StackError>;

    /// Starts the stack once every endpoint is registered.
    fn start(&mut self) -> Result<(), StackError> {
        Ok(())
    }

    /// Returns `true` once at least one fabric admitted the accessory.
    fn is_commissioned(&self) -> bool;

    /// Returns `true` while the operational network link is up.
    fn is_network_connected(&self) -> bool;

    /// Returns `true` while a commissioning window is advertised.
    fn is_commissioning_window_open(&self) -> bool;

    /// Opens a basic commissioning window for `timeout`.
    fn open_commissioning_window(&mut self, timeout: Duration) -> Result<(), StackError>;

    /// Erases fabric/credential state and returns the accessory to factory defaults.
    fn factory_reset(&mut self);

    /// Reads the currently stored attribute value.
    fn get_attribute(&self, path: AttributePath) -> Result<AttributeValue, StackError>;

    /// Submits an attribute update request. The stack runs the pre-update hook
    /// before committing the new value.
    fn set_attribute(&mut self, path: AttributePath, value: AttributeValue)
    -> Result<(), StackError>;
}

/// Attribute write awaiting the pre-update hook.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AttributeWrite {
    pub path: AttributePath,
    pub value: AttributeValue,
}

impl AttributeWrite {
    #[must_use]
    pub const fn new(path: AttributePath, value: AttributeValue) -> Self {
        Self { path, value }
    }
}

/// Stacks that hand pre-update notifications to the accessory through a queue.
pub trait InboundQueue {
    /// Pops the next write waiting for the pre-update hook.
    fn next_inbound(&mut self) -> Option<AttributeWrite>;

    /// Reports the hook verdict; accepted writes are committed, others dropped.
    fn finish_inbound(&mut self, write: AttributeWrite, accepted: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_off_path_is_recognised() {
        let path = AttributePath::on_off(3);
        assert!(path.is_on_off());
        assert_eq!(path.endpoint, 3);

        let level = AttributePath::new(3, 0x0008, 0x0000);
        assert!(!level.is_on_off());

        let same_id_other_cluster = AttributePath::new(3, IDENTIFY_CLUSTER, ON_OFF_ATTRIBUTE);
        assert!(!same_id_other_cluster.is_on_off());
    }

    #[test]
    fn only_boolean_values_convert_to_power() {
        assert_eq!(AttributeValue::Bool(true).as_bool(), Some(true));
        assert_eq!(AttributeValue::U8(1).as_bool(), None);
        assert_eq!(AttributeValue::Invalid.as_bool(), None);
    }
}
