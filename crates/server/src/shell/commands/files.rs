use async_trait::async_trait;
use fakeadb_device::DeviceError;
use fakeadb_protocol::ProtocolError;

use super::errno_text;
use crate::shell::{ShellCommand, ShellContext, ShellIo};

/// `rm [-f] [-r] path...`
pub struct Rm;

#[async_trait]
impl ShellCommand for Rm {
    fn executable(&self) -> &str {
        "rm"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        let mut force = false;
        let mut recursive = false;
        let mut paths = Vec::new();

        for word in ctx.words() {
            let Some(flags) = word.strip_prefix('-').filter(|f| !f.is_empty()) else {
                paths.push(word);
                continue;
            };
            for flag in flags.chars() {
                match flag {
                    'f' => force = true,
                    'r' | 'R' => recursive = true,
                    'v' | 'i' => {}
                    other => {
                        io.write_stderr(format!("rm: Unknown option '{}'\n", other).as_bytes())
                            .await?;
                        return Ok(1);
                    }
                }
            }
        }

        if paths.is_empty() {
            if force {
                return Ok(0);
            }
            io.write_stderr(b"rm: Needs 1 argument\n").await?;
            return Ok(1);
        }

        let mut code = 0;
        for path in &paths {
            let error = ctx.device.with_fs_mut(|fs| {
                if recursive {
                    (!fs.remove_recursive(path)).then_some("No such file or directory")
                } else if fs.is_dir(path) {
                    Some("Is a directory")
                } else {
                    (!fs.remove(path)).then_some("No such file or directory")
                }
            });

            match error {
                Some("No such file or directory") if force => {}
                Some(reason) => {
                    io.write_stderr(format!("rm: {}: {}\n", path, reason).as_bytes())
                        .await?;
                    code = 1;
                }
                None => {}
            }
        }
        Ok(code)
    }
}

/// `ls [-a] [-1] [path...]`, one name per line
pub struct Ls;

#[async_trait]
impl ShellCommand for Ls {
    fn executable(&self) -> &str {
        "ls"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        let mut paths: Vec<String> = ctx
            .words()
            .into_iter()
            .filter(|w| !w.starts_with('-'))
            .collect();
        if paths.is_empty() {
            paths.push("/".to_string());
        }
        let show_headers = paths.len() > 1;

        let mut code = 0;
        let mut output = String::new();
        for path in &paths {
            let listing = ctx.device.with_fs(|fs| {
                if fs.is_dir(path) {
                    fs.list(path).map(|entries| entries.into_iter().map(|(name, _)| name).collect())
                } else {
                    fs.stat(path)
                        .map(|_| vec![path.clone()])
                        .ok_or_else(|| DeviceError::NoSuchFile(path.clone()))
                }
            });

            match listing {
                Ok(names) => {
                    if show_headers {
                        output.push_str(&format!("{}:\n", path));
                    }
                    for name in names {
                        output.push_str(&name);
                        output.push('\n');
                    }
                }
                Err(e) => {
                    io.write_stderr(format!("ls: {}: {}\n", path, errno_text(&e)).as_bytes())
                        .await?;
                    code = 1;
                }
            }
        }

        io.write_stdout(output.as_bytes()).await?;
        Ok(code)
    }
}
