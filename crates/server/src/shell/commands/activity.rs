use async_trait::async_trait;
use fakeadb_protocol::ProtocolError;

use crate::shell::{ShellCommand, ShellContext, ShellIo};

/// Intent flags that take one value
const ONE_VALUE: &[&str] = &["-a", "-d", "-t", "-c", "-n", "-f", "-p", "--user", "--display"];
/// Intent extras that take a key and a value
const TWO_VALUES: &[&str] = &["-e", "--es", "--ei", "--ez", "--el", "--ef", "--eu"];

/// `am start|start-activity|force-stop`
pub struct Am;

#[async_trait]
impl ShellCommand for Am {
    fn executable(&self) -> &str {
        "am"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        activity_command(ctx, io, &ctx.words()).await
    }
}

/// Shared by `am …` and `cmd activity …`
pub(super) async fn activity_command(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    args: &[String],
) -> Result<u8, ProtocolError> {
    match args.split_first() {
        Some((sub, rest)) if sub == "start" || sub == "start-activity" => {
            start(ctx, io, rest).await
        }
        Some((sub, rest)) if sub == "force-stop" => {
            match rest.iter().find(|a| !a.starts_with('-')) {
                Some(_) => Ok(0),
                None => {
                    io.write_stderr(b"Error: no package specified\n").await?;
                    Ok(1)
                }
            }
        }
        Some((sub, _)) => {
            io.write_stderr(format!("Error: Unknown command: {}\n", sub).as_bytes())
                .await?;
            Ok(1)
        }
        None => {
            io.write_stderr(b"Error: no command specified\n").await?;
            Ok(1)
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Intent {
    action: Option<String>,
    component: Option<String>,
    wait: bool,
}

impl Intent {
    fn parse(args: &[String]) -> Self {
        let mut intent = Intent::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let arg = arg.as_str();
            if arg == "-W" {
                intent.wait = true;
            } else if arg == "-a" {
                intent.action = iter.next().cloned();
            } else if arg == "-n" {
                intent.component = iter.next().cloned();
            } else if ONE_VALUE.contains(&arg) {
                iter.next();
            } else if TWO_VALUES.contains(&arg) {
                iter.next();
                iter.next();
            } else if !arg.starts_with('-') && intent.component.is_none() {
                intent.component = Some(arg.to_string());
            }
        }
        intent
    }

    /// `act=… cmp=…` as printed by `am start`
    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(action) = &self.action {
            parts.push(format!("act={}", action));
        }
        if let Some(component) = &self.component {
            parts.push(format!("cmp={}", component));
        }
        parts.join(" ")
    }
}

async fn start(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    args: &[String],
) -> Result<u8, ProtocolError> {
    let intent = Intent::parse(args);
    if intent.action.is_none() && intent.component.is_none() {
        io.write_stderr(b"Error: Intent does not match any activities\n").await?;
        return Ok(1);
    }

    let mut output = format!("Starting: Intent {{ {} }}\n", intent.describe());
    if intent.wait {
        output.push_str("Status: ok\nLaunchState: COLD\n");
        if let Some(component) = &intent.component {
            output.push_str(&format!("Activity: {}\n", component));
        }
        output.push_str("TotalTime: 0\nWaitTime: 0\nComplete\n");
    }

    let target = intent
        .component
        .clone()
        .or_else(|| intent.action.clone())
        .unwrap_or_default();
    ctx.device.record_activity(target);
    io.write_stdout(output.as_bytes()).await?;
    Ok(0)
}
