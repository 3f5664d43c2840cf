//! Event types delivered to subscribers.

use upnp_discovery::Service;

/// One state-variable change from an event property set.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVariable {
    /// Variable name, e.g. "TransportState"
    pub name: String,
    /// Variable value as the service sent it
    pub value: String,
}

impl StateVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parsed event payload, tagged by the service kind that produced it.
///
/// Known kinds get their own variant so callers can match without inspecting
/// type URNs; everything else lands in `Unknown` with the service type
/// carried alongside, keeping unrecognized services deliverable.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// An AVTransport service event (transport state, track metadata, ...)
    AvTransport(Vec<StateVariable>),
    /// A RenderingControl service event (volume, mute, ...)
    RenderingControl(Vec<StateVariable>),
    /// An event from a service kind this engine has no dedicated variant for
    Unknown {
        /// The service type URN that produced the event
        service_type: String,
        /// The parsed state variables
        variables: Vec<StateVariable>,
    },
}

impl EventPayload {
    /// Tag a parsed variable list with the producing service's kind.
    pub fn for_service_type(service_type: &str, variables: Vec<StateVariable>) -> Self {
        if service_type.contains(":AVTransport:") {
            EventPayload::AvTransport(variables)
        } else if service_type.contains(":RenderingControl:") {
            EventPayload::RenderingControl(variables)
        } else {
            EventPayload::Unknown {
                service_type: service_type.to_string(),
                variables,
            }
        }
    }

    /// The state variables regardless of variant.
    pub fn variables(&self) -> &[StateVariable] {
        match self {
            EventPayload::AvTransport(vars) => vars,
            EventPayload::RenderingControl(vars) => vars,
            EventPayload::Unknown { variables, .. } => variables,
        }
    }

    /// Look up a variable value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables()
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }
}

/// A delivered service event.
///
/// Ephemeral: handed to the caller once and not retained by the engine.
#[derive(Debug, Clone)]
pub struct ServiceEvent {
    /// Subscription the event arrived on
    pub sid: String,
    /// Event sequence number within the subscription
    pub seq: u32,
    /// The service that produced the event
    pub service: Service,
    /// The parsed payload
    pub payload: EventPayload,
}
