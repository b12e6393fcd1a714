//! Binder services without a shell
//!
//! `abb_exec:` and `abb:` hand their arguments straight to a system service,
//! the way `cmd` does from a shell. Arguments are separated by `\0`, so a
//! word may contain spaces. `abb_exec:` answers over a raw stream like
//! `exec:`; `abb:` frames its output as shell v2 packets.

use async_trait::async_trait;
use fakeadb_protocol::{wire, AdbSocket, ProtocolError};
use tracing::debug;

use super::commands::service_command;
use super::{RawShellIo, ShellContext, ShellMode, ShellProtocol, ShellV2Session};
use crate::context::ServerContext;
use crate::handler::{DeviceCommandHandler, DeviceContext, SessionOutcome};

/// Split `abb` arguments at every `\0`
pub fn split_abb_args(args: &str) -> Vec<String> {
    args.split('\0')
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Serves `abb:` and `abb_exec:`
#[derive(Debug, Default)]
pub struct AbbHandler;

#[async_trait]
impl DeviceCommandHandler for AbbHandler {
    fn claims(&self, _server: &ServerContext, service: &str, _args: &str) -> bool {
        service == "abb" || service == "abb_exec"
    }

    async fn run(
        &self,
        ctx: &DeviceContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        let words = split_abb_args(ctx.args);
        let framed = ctx.service == "abb";
        let shell_ctx = ShellContext {
            server: ctx.server,
            device: &ctx.device,
            args: "",
            mode: ShellMode {
                protocol: if framed {
                    ShellProtocol::V2
                } else {
                    ShellProtocol::Exec
                },
                pty: false,
            },
        };
        debug!("{} {:?} on {}", ctx.service, words, ctx.device.serial());

        let code = if framed {
            let mut session = ShellV2Session::new(socket, ctx.server.shell_v2_chunk_size(), b"\n");
            session.start().await?;
            let code = service_command(&shell_ctx, &mut session, &words).await?;
            session.finish(code).await?;
            code
        } else {
            wire::write_okay(socket).await?;
            let mut io = RawShellIo::new(socket, b"\n");
            let code = service_command(&shell_ctx, &mut io, &words).await?;
            io.finish().await?;
            code
        };

        Ok(SessionOutcome::exited(code))
    }
}
