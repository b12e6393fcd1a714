use async_trait::async_trait;
use fakeadb_protocol::ProtocolError;

use super::errno_text;
use crate::shell::{ShellCommand, ShellContext, ShellIo};

/// `cat [file...]`; with no files (or `-`) copies stdin line by line
pub struct Cat;

impl Cat {
    /// Copy stdin to stdout one byte at a time, flushing at each `\n` and
    /// once more at EOF for a trailing partial line
    async fn copy_stdin(io: &mut dyn ShellIo) -> Result<(), ProtocolError> {
        let mut line = Vec::new();
        while let Some(chunk) = io.read_stdin().await? {
            for &byte in chunk.iter() {
                line.push(byte);
                if byte == b'\n' {
                    io.write_stdout(&line).await?;
                    line.clear();
                }
            }
        }
        if !line.is_empty() {
            io.write_stdout(&line).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ShellCommand for Cat {
    fn executable(&self) -> &str {
        "cat"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        let paths = ctx.words();
        if paths.is_empty() {
            Self::copy_stdin(io).await?;
            return Ok(0);
        }

        let mut code = 0;
        for path in &paths {
            if path == "-" {
                Self::copy_stdin(io).await?;
                continue;
            }
            match ctx.device.with_fs(|fs| fs.read(path)) {
                Ok(contents) => io.write_stdout(&contents).await?,
                Err(e) => {
                    io.write_stderr(format!("cat: {}: {}\n", path, errno_text(&e)).as_bytes())
                        .await?;
                    code = 1;
                }
            }
        }
        Ok(code)
    }
}
