use async_trait::async_trait;
use fakeadb_protocol::ProtocolError;

use crate::shell::{ShellCommand, ShellContext, ShellIo};

/// `logcat` over an empty log buffer
///
/// `-d` (dump) and `-c` (clear) return at once. Otherwise logcat follows
/// the log, which here means holding the session open until the client
/// closes its input.
pub struct Logcat;

#[async_trait]
impl ShellCommand for Logcat {
    fn executable(&self) -> &str {
        "logcat"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        let returns_at_once = ctx.words().iter().any(|w| w == "-d" || w == "-c");
        if !returns_at_once {
            while io.read_stdin().await?.is_some() {}
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::commands::testing::{device, pixel, run, CapturedIo};

    #[tokio::test]
    async fn test_dump_returns_empty_buffer() {
        let device = device(pixel());
        let mut io = CapturedIo::with_stdin(&[b"ignored"]);
        assert_eq!(run(&Logcat, &device, "-d -v threadtime", &mut io).await, 0);
        assert!(io.stdout.is_empty());
        assert_eq!(io.stdin.len(), 1);
    }

    #[tokio::test]
    async fn test_follow_drains_until_input_closes() {
        let device = device(pixel());
        let mut io = CapturedIo::with_stdin(&[b"a", b"b"]);
        assert_eq!(run(&Logcat, &device, "-v brief", &mut io).await, 0);
        assert!(io.stdin.is_empty());
        assert!(io.stdout.is_empty());
    }
}
