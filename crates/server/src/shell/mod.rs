//! Shell sessions
//!
//! `shell:`, `shell,v2:` and `exec:` requests all run a [`ShellCommand`]
//! picked by executable name. The command sees its stdin and stdout through
//! [`ShellIo`], so the same implementation serves the raw legacy stream
//! ([`v1`]) and the framed protocol ([`v2`]).

pub mod abb;
pub mod commands;
pub mod v1;
pub mod v2;

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use fakeadb_device::DeviceState;
use fakeadb_protocol::{wire, AdbSocket, ProtocolError};
use tracing::debug;

use crate::context::ServerContext;
use crate::handler::{reject, DeviceCommandHandler, DeviceContext, SessionOutcome};
use crate::registry::ShellCommandTable;

pub use abb::AbbHandler;
pub use v1::RawShellIo;
pub use v2::{SessionState, ShellV2Session};

/// Which shell service a request used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellProtocol {
    /// `shell:` raw stream
    V1,
    /// `shell,v2:` framed packets
    V2,
    /// `exec:` raw stream, never through a pty
    Exec,
}

/// Protocol plus the pty flag derived from the service options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellMode {
    pub protocol: ShellProtocol,
    /// Output passes through a pty that rewrites `\n` to the device newline
    pub pty: bool,
}

impl ShellMode {
    /// Parse a service name: `shell`, `shell,raw`, `shell,v2,TERM=xterm,pty`,
    /// `exec`
    pub fn parse(service: &str) -> Option<Self> {
        if service == "exec" {
            return Some(ShellMode {
                protocol: ShellProtocol::Exec,
                pty: false,
            });
        }

        let mut parts = service.split(',');
        if parts.next() != Some("shell") {
            return None;
        }
        let options: Vec<&str> = parts.collect();

        if options.contains(&"v2") {
            Some(ShellMode {
                protocol: ShellProtocol::V2,
                pty: options.contains(&"pty"),
            })
        } else {
            Some(ShellMode {
                protocol: ShellProtocol::V1,
                pty: !options.contains(&"raw"),
            })
        }
    }
}

/// A command's view of its session
#[async_trait]
pub trait ShellIo: Send {
    /// Next chunk of stdin, `None` once the client closed its input
    async fn read_stdin(&mut self) -> Result<Option<Bytes>, ProtocolError>;

    async fn write_stdout(&mut self, data: &[u8]) -> Result<(), ProtocolError>;

    /// Legacy sessions have a single stream; stderr is merged into it
    async fn write_stderr(&mut self, data: &[u8]) -> Result<(), ProtocolError>;
}

/// What a shell command is run with
pub struct ShellContext<'a> {
    pub server: &'a ServerContext,
    pub device: &'a Arc<DeviceState>,
    /// Everything after the executable name
    pub args: &'a str,
    pub mode: ShellMode,
}

impl ShellContext<'_> {
    /// Arguments split the way `sh` would, honouring quotes
    pub fn words(&self) -> Vec<String> {
        split_words(self.args)
    }
}

/// An executable available inside shell sessions
#[async_trait]
pub trait ShellCommand: Send + Sync {
    /// Name it is invoked as, e.g. `getprop`
    fn executable(&self) -> &str;

    /// Whether the device must be online to run it
    fn requires_online(&self) -> bool {
        true
    }

    /// Run to completion and return the exit code
    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError>;
}

/// Device handler for one shell protocol, running commands from a shared
/// table
pub struct ShellHandler {
    protocol: ShellProtocol,
    commands: Arc<ShellCommandTable>,
}

impl ShellHandler {
    pub fn new(protocol: ShellProtocol, commands: Arc<ShellCommandTable>) -> Self {
        Self { protocol, commands }
    }

    fn command_for(&self, service: &str, args: &str) -> Option<Arc<dyn ShellCommand>> {
        let mode = ShellMode::parse(service)?;
        if mode.protocol != self.protocol {
            return None;
        }
        let (executable, _) = split_command(args);
        self.commands.find(executable)
    }
}

#[async_trait]
impl DeviceCommandHandler for ShellHandler {
    fn claims(&self, _server: &ServerContext, service: &str, args: &str) -> bool {
        self.command_for(service, args).is_some()
    }

    fn requires_online(&self, _server: &ServerContext, service: &str, args: &str) -> bool {
        self.command_for(service, args)
            .map(|c| c.requires_online())
            .unwrap_or(true)
    }

    async fn run(
        &self,
        ctx: &DeviceContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        let (Some(mode), Some(command)) = (
            ShellMode::parse(ctx.service),
            self.command_for(ctx.service, ctx.args),
        ) else {
            return reject(socket, format!("unknown command: {}", ctx.args)).await;
        };

        let (_, args) = split_command(ctx.args);
        let newline: &'static [u8] = if mode.pty {
            ctx.device.shell_newline()
        } else {
            b"\n"
        };
        let shell_ctx = ShellContext {
            server: ctx.server,
            device: &ctx.device,
            args,
            mode,
        };
        debug!(
            "Running '{}' on {} over {:?}",
            command.executable(),
            ctx.device.serial(),
            mode.protocol
        );

        let code = match mode.protocol {
            ShellProtocol::V2 => {
                let mut session =
                    ShellV2Session::new(socket, ctx.server.shell_v2_chunk_size(), newline);
                session.start().await?;
                let code = command.run(&shell_ctx, &mut session).await?;
                session.finish(code).await?;
                code
            }
            ShellProtocol::V1 | ShellProtocol::Exec => {
                wire::write_okay(socket).await?;
                let mut io = RawShellIo::new(socket, newline);
                let code = command.run(&shell_ctx, &mut io).await?;
                io.finish().await?;
                code
            }
        };

        Ok(SessionOutcome::exited(code))
    }
}

/// Split a command line into its executable name and the rest. A path
/// such as `/system/bin/ls` resolves to its file name.
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    let (executable, rest) = match line.find(char::is_whitespace) {
        Some(i) => (&line[..i], line[i..].trim_start()),
        None => (line, ""),
    };
    let executable = executable.rsplit('/').next().unwrap_or(executable);
    (executable, rest)
}

/// Split arguments into words, honouring single quotes, double quotes and
/// backslash escapes
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some('"') if c == '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_word = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }

    if in_word {
        words.push(current);
    }
    words
}

/// Rewrite every `\n` in `data` to `newline`
pub fn translate_newlines<'a>(data: &'a [u8], newline: &[u8]) -> Cow<'a, [u8]> {
    if newline == b"\n" || !data.contains(&b'\n') {
        return Cow::Borrowed(data);
    }

    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    for &byte in data {
        if byte == b'\n' {
            out.extend_from_slice(newline);
        } else {
            out.push(byte);
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!(
            ShellMode::parse("shell"),
            Some(ShellMode {
                protocol: ShellProtocol::V1,
                pty: true
            })
        );
        assert_eq!(ShellMode::parse("shell,raw").map(|m| m.pty), Some(false));
        assert_eq!(
            ShellMode::parse("shell,v2,TERM=xterm-256color,raw"),
            Some(ShellMode {
                protocol: ShellProtocol::V2,
                pty: false
            })
        );
        assert_eq!(ShellMode::parse("shell,v2,pty").map(|m| m.pty), Some(true));
        assert_eq!(ShellMode::parse("exec").map(|m| m.protocol), Some(ShellProtocol::Exec));
        assert_eq!(ShellMode::parse("shellx"), None);
        assert_eq!(ShellMode::parse("sync"), None);
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("getprop ro.serialno"), ("getprop", "ro.serialno"));
        assert_eq!(split_command("  echo   a b"), ("echo", "a b"));
        assert_eq!(split_command("/system/bin/cat"), ("cat", ""));
        assert_eq!(split_command(""), ("", ""));
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("a  b"), vec!["a", "b"]);
        assert_eq!(split_words("'hello world' x"), vec!["hello world", "x"]);
        assert_eq!(split_words(r#""say \"hi\"""#), vec![r#"say "hi""#]);
        assert_eq!(split_words(r"a\ b"), vec!["a b"]);
        assert_eq!(split_words("''"), vec![""]);
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn test_translate_newlines() {
        assert_eq!(translate_newlines(b"a\nb\n", b"\r\n").as_ref(), b"a\r\nb\r\n");
        assert!(matches!(translate_newlines(b"a\nb", b"\n"), Cow::Borrowed(_)));
        assert!(matches!(translate_newlines(b"ab", b"\r\n"), Cow::Borrowed(_)));
    }
}
