//! Stock shell commands
//!
//! Approximations of the `adbd` shell builtins that ADB clients rely on.
//! Output formats follow what real devices print closely enough for client
//! parsers; they are not byte-exact for every Android release.

mod activity;
mod cat;
mod dumpsys;
mod echo;
mod files;
mod logcat;
mod package;
mod props;
mod protocol_echo;
mod wm;

use std::sync::Arc;

use fakeadb_device::DeviceError;

pub use activity::Am;
pub use cat::Cat;
pub use dumpsys::Dumpsys;
pub use echo::Echo;
pub use files::{Ls, Rm};
pub use logcat::Logcat;
pub use package::{Cmd, Pm};
pub(crate) use package::service_command;
pub use props::{GetProp, SetProp};
pub use protocol_echo::ProtocolEcho;
pub use wm::Wm;

use super::ShellCommand;

/// Every stock command, in lookup order
pub fn default_commands() -> Vec<Arc<dyn ShellCommand>> {
    vec![
        Arc::new(Cat),
        Arc::new(Echo),
        Arc::new(GetProp),
        Arc::new(SetProp),
        Arc::new(Rm),
        Arc::new(Ls),
        Arc::new(Pm),
        Arc::new(Am),
        Arc::new(Dumpsys),
        Arc::new(Cmd),
        Arc::new(Wm),
        Arc::new(Logcat),
        Arc::new(ProtocolEcho),
    ]
}

/// `strerror`-style text for a filesystem error
fn errno_text(err: &DeviceError) -> &'static str {
    match err {
        DeviceError::IsDirectory(_) => "Is a directory",
        DeviceError::NotDirectory(_) => "Not a directory",
        _ => "No such file or directory",
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Drive a command without a socket

    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use fakeadb_core::{DeviceConfig, ServerConfig};
    use fakeadb_device::DeviceState;
    use fakeadb_protocol::ProtocolError;

    use crate::context::ServerContext;
    use crate::registry::HandlerRegistry;
    use crate::shell::{ShellCommand, ShellContext, ShellIo, ShellMode, ShellProtocol};

    /// In-memory [`ShellIo`] with scripted stdin
    #[derive(Default)]
    pub struct CapturedIo {
        pub stdin: Vec<Bytes>,
        pub stdout: Vec<u8>,
        pub stderr: Vec<u8>,
        /// stdout writes in order, to check flush points
        pub writes: Vec<Vec<u8>>,
    }

    impl CapturedIo {
        pub fn with_stdin(chunks: &[&[u8]]) -> Self {
            Self {
                stdin: chunks.iter().rev().map(|c| Bytes::copy_from_slice(c)).collect(),
                ..Self::default()
            }
        }

        pub fn stdout_text(&self) -> String {
            String::from_utf8_lossy(&self.stdout).into_owned()
        }

        pub fn stderr_text(&self) -> String {
            String::from_utf8_lossy(&self.stderr).into_owned()
        }
    }

    #[async_trait]
    impl ShellIo for CapturedIo {
        async fn read_stdin(&mut self) -> Result<Option<Bytes>, ProtocolError> {
            Ok(self.stdin.pop())
        }

        async fn write_stdout(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
            self.stdout.extend_from_slice(data);
            self.writes.push(data.to_vec());
            Ok(())
        }

        async fn write_stderr(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
            self.stderr.extend_from_slice(data);
            Ok(())
        }
    }

    pub fn server() -> ServerContext {
        ServerContext::new(ServerConfig::ephemeral(), HandlerRegistry::new())
    }

    pub fn device(config: DeviceConfig) -> Arc<DeviceState> {
        Arc::new(DeviceState::new(&config, 1))
    }

    pub fn pixel() -> DeviceConfig {
        DeviceConfig::new("emulator-5554", "Google", "Pixel", "13", 33)
    }

    /// Run `command` with `args` and return its exit code
    pub async fn run(
        command: &dyn ShellCommand,
        device: &Arc<DeviceState>,
        args: &str,
        io: &mut CapturedIo,
    ) -> u8 {
        let server = server();
        let ctx = ShellContext {
            server: &server,
            device,
            args,
            mode: ShellMode {
                protocol: ShellProtocol::V2,
                pty: false,
            },
        };
        command.run(&ctx, io).await.unwrap()
    }
}
