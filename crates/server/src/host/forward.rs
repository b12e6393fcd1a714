use std::sync::Arc;

use async_trait::async_trait;
use fakeadb_device::{DeviceError, DeviceState, ForwardRule, ForwardTable, TransportSelector};
use fakeadb_protocol::{wire, AdbSocket, ProtocolError};
use tracing::debug;

use crate::handler::{reject, HostCommandHandler, HostContext, SessionOutcome};

/// One request of the forward family, shared by `host:` forwards and
/// `reverse:`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardCommand<'a> {
    /// `forward:[norebind:]<local>;<remote>`
    Add {
        local: &'a str,
        remote: &'a str,
        rebind: bool,
    },
    /// `killforward:<local>`
    Remove { local: &'a str },
    /// `killforward-all`
    RemoveAll,
    /// `list-forward`
    List,
}

impl<'a> ForwardCommand<'a> {
    /// Parse a command and its arguments; `None` if it is not a forward
    /// request or is missing its `;`
    pub fn parse(command: &str, args: &'a str) -> Option<Self> {
        match command {
            "forward" => {
                let (rebind, rules) = match args.strip_prefix("norebind:") {
                    Some(rules) => (false, rules),
                    None => (true, args),
                };
                let (local, remote) = rules.split_once(';')?;
                Some(ForwardCommand::Add {
                    local,
                    remote,
                    rebind,
                })
            }
            "killforward" => Some(ForwardCommand::Remove { local: args }),
            "killforward-all" => Some(ForwardCommand::RemoveAll),
            "list-forward" => Some(ForwardCommand::List),
            _ => None,
        }
    }

    /// Apply to `table`. Listing leaves it untouched.
    pub fn apply(&self, table: &mut ForwardTable) -> Result<(), DeviceError> {
        match *self {
            ForwardCommand::Add {
                local,
                remote,
                rebind,
            } => table.add(local, remote, rebind),
            ForwardCommand::Remove { local } => table.remove(local).map(|_| ()),
            ForwardCommand::RemoveAll => {
                table.clear();
                Ok(())
            }
            ForwardCommand::List => Ok(()),
        }
    }
}

/// `list-forward` body: one `<serial> <local> <remote>` line per rule
pub fn format_forward_list(serial: &str, rules: &[ForwardRule]) -> String {
    rules
        .iter()
        .map(|rule| format!("{} {} {}\n", serial, rule.local, rule.remote))
        .collect()
}

/// `forward`, `killforward`, `killforward-all` and `list-forward`
///
/// Listing and removing everything span all devices unless the request
/// names one. Successful changes are answered with two `OKAY`s, the second
/// confirming the listener.
pub struct Forward;

#[async_trait]
impl HostCommandHandler for Forward {
    fn claims(&self, command: &str) -> bool {
        matches!(command, "forward" | "killforward" | "killforward-all" | "list-forward")
    }

    async fn run(
        &self,
        ctx: &HostContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        let Some(request) = ForwardCommand::parse(ctx.command, ctx.args) else {
            return reject(socket, format!("malformed forward request: {}", ctx.args)).await;
        };

        let all_devices = matches!(request, ForwardCommand::List | ForwardCommand::RemoveAll)
            && ctx.selector == TransportSelector::Any;
        let devices: Vec<Arc<DeviceState>> = if all_devices {
            ctx.server.devices().snapshot()
        } else {
            match ctx.device() {
                Ok(device) => vec![device],
                Err(e) => return reject(socket, e.to_string()).await,
            }
        };

        if request == ForwardCommand::List {
            let listing: String = devices
                .iter()
                .map(|device| format_forward_list(device.serial(), &device.forwards()))
                .collect();
            wire::write_okay(socket).await?;
            wire::write_hex_string(socket, listing.as_bytes()).await?;
            return Ok(SessionOutcome::completed());
        }

        for device in &devices {
            if let Err(e) = device.with_forwards_mut(|table| request.apply(table)) {
                return reject(socket, e.to_string()).await;
            }
            debug!("{} on {}: {:?}", ctx.command, device.serial(), request);
        }

        wire::write_okay(socket).await?;
        wire::write_okay(socket).await?;
        Ok(SessionOutcome::completed())
    }
}

#[cfg(test)]
mod tests {
    use fakeadb_core::{DeviceConfig, ServerConfig};
    use fakeadb_protocol::Status;
    use tokio::io::{duplex, AsyncReadExt};

    use super::*;
    use crate::context::ServerContext;
    use crate::registry::HandlerRegistry;

    fn server() -> ServerContext {
        let server = ServerContext::new(ServerConfig::ephemeral(), HandlerRegistry::new());
        for serial in ["a", "b"] {
            server
                .devices()
                .attach(&DeviceConfig::new(serial, "Google", "Pixel", "13", 33))
                .unwrap();
        }
        server
    }

    /// Serve one request and return the outcome and everything written
    async fn serve(
        server: &ServerContext,
        selector: TransportSelector,
        command: &str,
        args: &str,
    ) -> (SessionOutcome, Vec<u8>) {
        let ctx = HostContext {
            server,
            selector,
            command,
            args,
        };
        let (mut client, mut server_side) = duplex(4096);
        let outcome = Forward.execute(&ctx, &mut server_side).await;
        drop(server_side);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        (outcome, received)
    }

    fn serial(name: &str) -> TransportSelector {
        TransportSelector::Serial(name.to_string())
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            ForwardCommand::parse("forward", "norebind:tcp:6000;tcp:7000"),
            Some(ForwardCommand::Add {
                local: "tcp:6000",
                remote: "tcp:7000",
                rebind: false
            })
        );
        assert_eq!(
            ForwardCommand::parse("forward", "tcp:6000;localabstract:x"),
            Some(ForwardCommand::Add {
                local: "tcp:6000",
                remote: "localabstract:x",
                rebind: true
            })
        );
        assert_eq!(ForwardCommand::parse("forward", "tcp:6000"), None);
        assert_eq!(
            ForwardCommand::parse("killforward", "tcp:6000"),
            Some(ForwardCommand::Remove { local: "tcp:6000" })
        );
        assert_eq!(ForwardCommand::parse("devices", ""), None);
    }

    #[tokio::test]
    async fn test_forward_then_list() {
        let server = server();
        let (outcome, received) = serve(&server, serial("a"), "forward", "tcp:6000;tcp:7000").await;
        assert_eq!(outcome, SessionOutcome::completed());
        assert_eq!(received, b"OKAYOKAY");

        serve(&server, serial("b"), "forward", "tcp:6001;localabstract:foo").await;

        let (_, received) = serve(&server, TransportSelector::Any, "list-forward", "").await;
        let mut stream = &received[..];
        assert_eq!(wire::read_status(&mut stream).await.unwrap(), Status::Okay);
        assert_eq!(
            wire::read_hex_string(&mut stream).await.unwrap(),
            b"a tcp:6000 tcp:7000\nb tcp:6001 localabstract:foo\n"
        );
    }

    #[tokio::test]
    async fn test_norebind_conflict_fails() {
        let server = server();
        serve(&server, serial("a"), "forward", "tcp:6000;tcp:7000").await;
        let (outcome, _) =
            serve(&server, serial("a"), "forward", "norebind:tcp:6000;tcp:7001").await;
        assert!(outcome.is_rejected());
        assert_eq!(server.devices().get("a").unwrap().forwards()[0].remote, "tcp:7000");
    }

    #[tokio::test]
    async fn test_forward_needs_one_device() {
        let server = server();
        let (_, received) = serve(&server, TransportSelector::Any, "forward", "tcp:1;tcp:2").await;
        let mut stream = &received[..];
        assert_eq!(
            wire::read_status(&mut stream).await.unwrap(),
            Status::Fail("more than one device/emulator".into())
        );
    }

    #[tokio::test]
    async fn test_killforward() {
        let server = server();
        serve(&server, serial("a"), "forward", "tcp:6000;tcp:7000").await;

        let (outcome, _) = serve(&server, serial("a"), "killforward", "tcp:6000").await;
        assert_eq!(outcome, SessionOutcome::completed());
        assert!(server.devices().get("a").unwrap().forwards().is_empty());

        let (outcome, _) = serve(&server, serial("a"), "killforward", "tcp:6000").await;
        assert_eq!(
            outcome,
            SessionOutcome::Rejected {
                reason: "listener 'tcp:6000' not found".into()
            }
        );
    }

    #[tokio::test]
    async fn test_killforward_all_spans_devices() {
        let server = server();
        serve(&server, serial("a"), "forward", "tcp:6000;tcp:7000").await;
        serve(&server, serial("b"), "forward", "tcp:6001;tcp:7001").await;

        serve(&server, TransportSelector::Any, "killforward-all", "").await;
        for name in ["a", "b"] {
            assert!(server.devices().get(name).unwrap().forwards().is_empty());
        }
    }

    #[tokio::test]
    async fn test_malformed_spec_rejected() {
        let server = server();
        let (outcome, _) = serve(&server, serial("a"), "forward", "tcp:abc;tcp:7000").await;
        assert_eq!(
            outcome,
            SessionOutcome::Rejected {
                reason: "cannot bind listener: malformed socket spec 'tcp:abc'".into()
            }
        );
    }
}
