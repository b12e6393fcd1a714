use async_trait::async_trait;
use fakeadb_protocol::ProtocolError;

use crate::shell::{ShellCommand, ShellContext, ShellIo};

/// `echo [-n] [text...]`
pub struct Echo;

#[async_trait]
impl ShellCommand for Echo {
    fn executable(&self) -> &str {
        "echo"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        let mut words = ctx.words();
        let newline = if words.first().map(String::as_str) == Some("-n") {
            words.remove(0);
            false
        } else {
            true
        };

        let mut text = words.join(" ");
        if newline {
            text.push('\n');
        }
        io.write_stdout(text.as_bytes()).await?;
        Ok(0)
    }
}
