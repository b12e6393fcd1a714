//! Request parsing
//!
//! A request is either addressed to the host (`host:…` and its per-device
//! variants) or to the device picked by an earlier transport selection.

use fakeadb_device::TransportSelector;

/// A parsed host request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest<'a> {
    /// Switch this connection to a device. `tport:` variants also want the
    /// transport id back.
    Transport {
        selector: TransportSelector,
        reply_id: bool,
    },
    /// A host service, optionally addressed to one device
    Service {
        selector: TransportSelector,
        command: &'a str,
        args: &'a str,
    },
}

/// Split `service:args` at the first `:`
pub fn split_service(request: &str) -> (&str, &str) {
    request.split_once(':').unwrap_or((request, ""))
}

/// Split `<serial>:<rest>` where the serial itself may be `host:port`
fn split_serial(text: &str) -> Option<(&str, &str)> {
    let first = text.find(':')?;
    let after = &text[first + 1..];
    if let Some(port_end) = after.find(':') {
        let port = &after[..port_end];
        if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
            let end = first + 1 + port_end;
            return Some((&text[..end], &text[end + 1..]));
        }
    }
    Some((&text[..first], after))
}

fn parse_transport(command: &str) -> Option<HostRequest<'static>> {
    let (selector, reply_id) = match command {
        "transport-any" => (TransportSelector::Any, false),
        "transport-usb" => (TransportSelector::Usb, false),
        "transport-local" => (TransportSelector::Local, false),
        "tport:any" => (TransportSelector::Any, true),
        "tport:usb" => (TransportSelector::Usb, true),
        "tport:local" => (TransportSelector::Local, true),
        _ => {
            if let Some(serial) = command.strip_prefix("transport:") {
                (TransportSelector::Serial(serial.to_string()), false)
            } else if let Some(serial) = command.strip_prefix("tport:serial:") {
                (TransportSelector::Serial(serial.to_string()), true)
            } else if let Some(id) = command.strip_prefix("transport-id:") {
                (TransportSelector::TransportId(id.parse().ok()?), false)
            } else {
                return None;
            }
        }
    };
    Some(HostRequest::Transport { selector, reply_id })
}

/// Parse a host request; `None` means the request is for a device
pub fn parse_host_request(request: &str) -> Option<HostRequest<'_>> {
    let (selector, rest) = if let Some(rest) = request.strip_prefix("host:") {
        (TransportSelector::Any, rest)
    } else if let Some(rest) = request.strip_prefix("host-usb:") {
        (TransportSelector::Usb, rest)
    } else if let Some(rest) = request.strip_prefix("host-local:") {
        (TransportSelector::Local, rest)
    } else if let Some(rest) = request.strip_prefix("host-serial:") {
        let (serial, rest) = split_serial(rest)?;
        (TransportSelector::Serial(serial.to_string()), rest)
    } else if let Some(rest) = request.strip_prefix("host-transport-id:") {
        let (id, rest) = rest.split_once(':')?;
        (TransportSelector::TransportId(id.parse().ok()?), rest)
    } else {
        return None;
    };

    if selector == TransportSelector::Any {
        if let Some(transport) = parse_transport(rest) {
            return Some(transport);
        }
    }

    let (command, args) = split_service(rest);
    Some(HostRequest::Service {
        selector,
        command,
        args,
    })
}
