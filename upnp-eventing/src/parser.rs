//! GENA event body parsing.
//!
//! Event bodies arrive as a `propertyset` whose property elements carry one
//! state variable each, named by the element itself, so the walk is manual
//! rather than serde-derived. AVTransport-family services additionally wrap
//! their state in a `LastChange` variable containing escaped XML with `val`
//! attributes, which gets unwrapped into plain variables here.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, SubscriptionError};
use crate::event::StateVariable;

/// Parse a NOTIFY body into its state variables, in document order.
///
/// A single `LastChange` variable is transparently unwrapped into the
/// variables of its embedded change document.
pub fn parse_property_set(xml: &str) -> Result<Vec<StateVariable>> {
    let variables = walk_property_set(xml)?;

    // AVTransport/RenderingControl wrap everything in LastChange.
    if let [only] = variables.as_slice() {
        if only.name == "LastChange" && !only.value.is_empty() {
            return parse_last_change(&only.value);
        }
    }

    Ok(variables)
}

fn walk_property_set(xml: &str) -> Result<Vec<StateVariable>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut variables = Vec::new();
    let mut depth = 0usize;
    let mut saw_propertyset = false;
    let mut current: Option<String> = None;
    let mut value = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match depth {
                    1 => {
                        if name != "propertyset" {
                            return Err(SubscriptionError::MalformedEvent(format!(
                                "unexpected root element {name:?}"
                            )));
                        }
                        saw_propertyset = true;
                    }
                    2 => {
                        if name != "property" {
                            return Err(SubscriptionError::MalformedEvent(format!(
                                "unexpected element {name:?} in propertyset"
                            )));
                        }
                    }
                    3 => {
                        current = Some(name);
                        value.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if depth == 0 && name == "propertyset" {
                    // A self-closed propertyset is valid, just empty.
                    saw_propertyset = true;
                } else if depth == 2 {
                    // An empty variable element: present, but no value.
                    variables.push(StateVariable::new(name, ""));
                }
            }
            Ok(Event::Text(t)) => {
                if current.is_some() {
                    let text = t
                        .unescape()
                        .map_err(|e| SubscriptionError::MalformedEvent(e.to_string()))?;
                    value.push_str(&text);
                }
            }
            Ok(Event::End(_)) => {
                if depth == 3 {
                    if let Some(name) = current.take() {
                        variables.push(StateVariable::new(name, std::mem::take(&mut value)));
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SubscriptionError::MalformedEvent(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    if !saw_propertyset {
        return Err(SubscriptionError::MalformedEvent(
            "body contained no propertyset".to_string(),
        ));
    }

    Ok(variables)
}

/// Parse a LastChange document into state variables.
///
/// The document is `<Event><InstanceID val="0"><TransportState
/// val="PLAYING"/>...</InstanceID></Event>`; every element below InstanceID
/// contributes one variable from its `val` attribute.
pub fn parse_last_change(xml: &str) -> Result<Vec<StateVariable>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut variables = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "Event" || name == "InstanceID" {
                    continue;
                }
                let val = e
                    .try_get_attribute("val")
                    .map_err(|e| SubscriptionError::MalformedEvent(e.to_string()))?;
                if let Some(attr) = val {
                    let value = attr
                        .unescape_value()
                        .map_err(|e| SubscriptionError::MalformedEvent(e.to_string()))?;
                    variables.push(StateVariable::new(name, value.to_string()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SubscriptionError::MalformedEvent(format!(
                    "LastChange XML error: {e}"
                )))
            }
        }
    }

    Ok(variables)
}
