use async_trait::async_trait;
use fakeadb_protocol::ProtocolError;

use crate::shell::{ShellCommand, ShellContext, ShellIo};

const PHYSICAL_SIZE: &str = "1080x2400";
const DEFAULT_DENSITY: &str = "420";

/// `wm size` and `wm density`
///
/// The panel is always 1080x2400. Density follows `ro.sf.lcd_density`
/// when the device sets it.
pub struct Wm;

#[async_trait]
impl ShellCommand for Wm {
    fn executable(&self) -> &str {
        "wm"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        let words = ctx.words();
        match words.first().map(String::as_str) {
            Some("size") => {
                let output = format!("Physical size: {}\n", PHYSICAL_SIZE);
                io.write_stdout(output.as_bytes()).await?;
                Ok(0)
            }
            Some("density") => {
                let density = ctx
                    .device
                    .property("ro.sf.lcd_density")
                    .unwrap_or_else(|| DEFAULT_DENSITY.to_string());
                let output = format!("Physical density: {}\n", density);
                io.write_stdout(output.as_bytes()).await?;
                Ok(0)
            }
            Some(other) => {
                let message = format!("Error: unknown command '{}'\n", other);
                io.write_stderr(message.as_bytes()).await?;
                Ok(1)
            }
            None => {
                io.write_stderr(b"usage: wm [size|density]\n").await?;
                Ok(1)
            }
        }
    }
}
