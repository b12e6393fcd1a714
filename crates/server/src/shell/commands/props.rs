use async_trait::async_trait;
use fakeadb_protocol::ProtocolError;

use crate::shell::{ShellCommand, ShellContext, ShellIo};

/// `getprop [name [default]]`
///
/// Without a name, prints every property as `[name]: [value]`. Served
/// whatever the device status, like the real property service.
pub struct GetProp;

#[async_trait]
impl ShellCommand for GetProp {
    fn executable(&self) -> &str {
        "getprop"
    }

    fn requires_online(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        let words = ctx.words();
        let output = match words.as_slice() {
            [] => ctx
                .device
                .properties()
                .iter()
                .map(|(key, value)| format!("[{}]: [{}]\n", key, value))
                .collect::<String>(),
            [key, rest @ ..] => {
                let value = ctx
                    .device
                    .property(key)
                    .or_else(|| rest.first().cloned())
                    .unwrap_or_default();
                format!("{}\n", value)
            }
        };

        io.write_stdout(output.as_bytes()).await?;
        Ok(0)
    }
}

/// `setprop name value`. `ro.*` properties are write-once.
pub struct SetProp;

#[async_trait]
impl ShellCommand for SetProp {
    fn executable(&self) -> &str {
        "setprop"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        let words = ctx.words();
        let [key, value] = words.as_slice() else {
            io.write_stderr(b"usage: setprop NAME VALUE\n").await?;
            return Ok(1);
        };

        if key.starts_with("ro.") && ctx.device.property(key).is_some() {
            let message = format!("setprop: failed to set property '{}' to '{}'\n", key, value);
            io.write_stderr(message.as_bytes())
                .await?;
            return Ok(1);
        }

        ctx.device.set_property(key.clone(), value.clone());
        Ok(0)
    }
}
