//! `pm` and `cmd`
//!
//! `cmd package …` and `pm …` share one implementation backed by the
//! device's [`PackageManager`](fakeadb_device::PackageManager). Streaming
//! installs (`install-write -S <size> <session> <split> -`) consume the APK
//! bytes from stdin.

use async_trait::async_trait;
use fakeadb_protocol::ProtocolError;

use super::activity;
use crate::shell::{ShellCommand, ShellContext, ShellIo};

/// Exit code `cmd` uses for an unknown service
const NO_SERVICE: u8 = 20;

/// `pm <subcommand>`
pub struct Pm;

#[async_trait]
impl ShellCommand for Pm {
    fn executable(&self) -> &str {
        "pm"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        package_command(ctx, io, &ctx.words()).await
    }
}

/// `cmd <service> <args>`; knows the `package` and `activity` services
pub struct Cmd;

#[async_trait]
impl ShellCommand for Cmd {
    fn executable(&self) -> &str {
        "cmd"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        service_command(ctx, io, &ctx.words()).await
    }
}

/// `<service> <args…>` sent to a system service. Backs `cmd` and the
/// `abb` services.
pub(crate) async fn service_command(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    words: &[String],
) -> Result<u8, ProtocolError> {
    match words.split_first() {
        Some((service, args)) if service == "package" => package_command(ctx, io, args).await,
        Some((service, args)) if service == "activity" => {
            activity::activity_command(ctx, io, args).await
        }
        Some((service, _)) => {
            io.write_stderr(format!("cmd: Can't find service: {}\n", service).as_bytes())
                .await?;
            Ok(NO_SERVICE)
        }
        None => {
            io.write_stderr(b"cmd: No service specified; use -l to list all services\n")
                .await?;
            Ok(NO_SERVICE)
        }
    }
}

async fn package_command(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    args: &[String],
) -> Result<u8, ProtocolError> {
    let Some((subcommand, rest)) = args.split_first() else {
        io.write_stderr(b"Error: no command specified\n").await?;
        return Ok(1);
    };

    match (subcommand.as_str(), rest.first().map(String::as_str)) {
        ("list", Some("packages")) => list_packages(ctx, io, &rest[1..]).await,
        ("list", Some("users")) => list_users(ctx, io).await,
        ("path", _) => path(ctx, io, rest).await,
        ("install-create", _) => install_create(ctx, io, rest).await,
        ("install-write", _) => install_write(ctx, io, rest).await,
        ("install-commit", _) => install_commit(ctx, io, rest).await,
        ("install-abandon", _) => install_abandon(ctx, io, rest).await,
        ("uninstall", _) => uninstall(ctx, io, rest).await,
        _ => {
            io.write_stderr(format!("Unknown command: {}\n", args.join(" ")).as_bytes())
                .await?;
            Ok(1)
        }
    }
}

/// `list packages [-f] [filter]`
async fn list_packages(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    args: &[String],
) -> Result<u8, ProtocolError> {
    let show_path = args.iter().any(|a| a == "-f");
    let filter = args.iter().find(|a| !a.starts_with('-'));

    let output: String = ctx.device.with_packages(|pm| {
        pm.names()
            .into_iter()
            .filter(|name| filter.map_or(true, |f| name.contains(f.as_str())))
            .map(|name| match pm.paths(&name).first() {
                Some(path) if show_path => format!("package:{}={}\n", path, name),
                _ => format!("package:{}\n", name),
            })
            .collect()
    });

    io.write_stdout(output.as_bytes()).await?;
    Ok(0)
}

async fn list_users(ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
    let mut output = String::from("Users:\n");
    ctx.device.with_packages(|pm| {
        for user in pm.users() {
            output.push_str(&format!(
                "\tUserInfo{{{}:{}:{:x}}}{}\n",
                user.id,
                user.name,
                user.flags,
                if user.running { " running" } else { "" }
            ));
        }
    });

    io.write_stdout(output.as_bytes()).await?;
    Ok(0)
}

/// `path <package>`; prints nothing and fails for unknown packages
async fn path(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    args: &[String],
) -> Result<u8, ProtocolError> {
    let Some(package) = args.iter().find(|a| !a.starts_with('-')) else {
        io.write_stderr(b"Error: no package specified\n").await?;
        return Ok(1);
    };

    let paths = ctx.device.with_packages(|pm| pm.paths(package));
    if paths.is_empty() {
        return Ok(1);
    }

    let output: String = paths.iter().map(|p| format!("package:{}\n", p)).collect();
    io.write_stdout(output.as_bytes()).await?;
    Ok(0)
}

/// `install-create [-p|--pkg <package>] [options]`
async fn install_create(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    args: &[String],
) -> Result<u8, ProtocolError> {
    let package = args
        .iter()
        .position(|a| a == "-p" || a == "--pkg")
        .and_then(|i| args.get(i + 1))
        .cloned();

    let id = ctx.device.with_packages_mut(|pm| pm.create_session(package));
    io.write_stdout(format!("Success: created install session [{}]\n", id).as_bytes())
        .await?;
    Ok(0)
}

/// `install-write [-S <size>] <session> <split> [<path>|-]`
async fn install_write(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    args: &[String],
) -> Result<u8, ProtocolError> {
    let mut size: Option<u64> = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-S" {
            size = iter.next().and_then(|s| s.parse().ok());
        } else {
            positional.push(arg.as_str());
        }
    }

    let (Some(id), Some(split)) = (positional.first(), positional.get(1)) else {
        io.write_stderr(b"Error: must specify session ID and split name\n").await?;
        return Ok(1);
    };
    let Some(id) = parse_session_id(io, id).await? else {
        return Ok(1);
    };
    let split = split.strip_suffix(".apk").unwrap_or(*split).to_string();

    let written = match positional.get(2).copied() {
        Some("-") | None => match size {
            Some(size) => {
                let received = drain_stdin(io, size).await?;
                if received < size {
                    let message =
                        format!("Error: expected {} bytes, received {}\n", size, received);
                    io.write_stderr(message.as_bytes()).await?;
                    return Ok(1);
                }
                size
            }
            None => {
                io.write_stderr(b"Error: must specify -S when streaming from stdin\n")
                    .await?;
                return Ok(1);
            }
        },
        Some(path) => match ctx.device.with_fs(|fs| fs.stat(path)) {
            Some(stat) if !stat.is_dir() => stat.size,
            _ => {
                io.write_stderr(format!("Error: unable to open file: {}\n", path).as_bytes())
                    .await?;
                return Ok(1);
            }
        },
    };

    let result = ctx
        .device
        .with_packages_mut(|pm| pm.write_session(id, split, written));
    match result {
        Ok(()) => {
            io.write_stdout(format!("Success: streamed {} bytes\n", written).as_bytes())
                .await?;
            Ok(0)
        }
        Err(e) => {
            io.write_stderr(format!("Error: {}\n", e).as_bytes()).await?;
            Ok(1)
        }
    }
}

async fn install_commit(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    args: &[String],
) -> Result<u8, ProtocolError> {
    let Some(id) = session_arg(io, args).await? else {
        return Ok(1);
    };

    match ctx.device.with_packages_mut(|pm| pm.commit_session(id)) {
        Ok(_) => {
            io.write_stdout(b"Success\n").await?;
            Ok(0)
        }
        Err(e) => {
            io.write_stderr(format!("Failure [{}]\n", e).as_bytes()).await?;
            Ok(1)
        }
    }
}

async fn install_abandon(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    args: &[String],
) -> Result<u8, ProtocolError> {
    let Some(id) = session_arg(io, args).await? else {
        return Ok(1);
    };

    match ctx.device.with_packages_mut(|pm| pm.abandon_session(id)) {
        Ok(()) => {
            io.write_stdout(b"Success\n").await?;
            Ok(0)
        }
        Err(e) => {
            io.write_stderr(format!("Failure [{}]\n", e).as_bytes()).await?;
            Ok(1)
        }
    }
}

async fn uninstall(
    ctx: &ShellContext<'_>,
    io: &mut dyn ShellIo,
    args: &[String],
) -> Result<u8, ProtocolError> {
    let Some(package) = args.iter().find(|a| !a.starts_with('-')) else {
        io.write_stderr(b"Error: package name not specified\n").await?;
        return Ok(1);
    };

    if ctx.device.with_packages_mut(|pm| pm.uninstall(package)) {
        io.write_stdout(b"Success\n").await?;
        Ok(0)
    } else {
        io.write_stdout(b"Failure [DELETE_FAILED_INTERNAL_ERROR]\n").await?;
        Ok(1)
    }
}

async fn session_arg(io: &mut dyn ShellIo, args: &[String]) -> Result<Option<u32>, ProtocolError> {
    match args.first() {
        Some(id) => parse_session_id(io, id).await,
        None => {
            io.write_stderr(b"Error: must specify session ID\n").await?;
            Ok(None)
        }
    }
}

async fn parse_session_id(io: &mut dyn ShellIo, text: &str) -> Result<Option<u32>, ProtocolError> {
    match text.parse() {
        Ok(id) => Ok(Some(id)),
        Err(_) => {
            io.write_stderr(format!("Error: invalid session ID '{}'\n", text).as_bytes())
                .await?;
            Ok(None)
        }
    }
}

/// Consume up to `size` bytes of stdin, returning how many arrived
async fn drain_stdin(io: &mut dyn ShellIo, size: u64) -> Result<u64, ProtocolError> {
    let mut received = 0u64;
    while received < size {
        match io.read_stdin().await? {
            Some(chunk) => received += chunk.len() as u64,
            None => break,
        }
    }
    Ok(received.min(size))
}
