use async_trait::async_trait;
use fakeadb_protocol::ProtocolError;

use crate::shell::{ShellCommand, ShellContext, ShellIo};

/// `shell-protocol-echo`: copies every stdin chunk to both stdout and
/// stderr until stdin closes. Handy for exercising a client's shell v2
/// plumbing.
pub struct ProtocolEcho;

#[async_trait]
impl ShellCommand for ProtocolEcho {
    fn executable(&self) -> &str {
        "shell-protocol-echo"
    }

    async fn run(
        &self,
        _ctx: &ShellContext<'_>,
        io: &mut dyn ShellIo,
    ) -> Result<u8, ProtocolError> {
        while let Some(chunk) = io.read_stdin().await? {
            io.write_stdout(&chunk).await?;
            io.write_stderr(&chunk).await?;
        }
        Ok(0)
    }
}
