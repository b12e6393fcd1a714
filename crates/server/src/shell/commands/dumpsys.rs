use async_trait::async_trait;
use fakeadb_protocol::ProtocolError;

use crate::shell::{ShellCommand, ShellContext, ShellIo};

const SERVICES: &[&str] = &["activity", "package"];

/// First app uid handed out by the package manager
const FIRST_APPLICATION_UID: usize = 10000;

/// `dumpsys [service [package]]`; only `package` has content
pub struct Dumpsys;

#[async_trait]
impl ShellCommand for Dumpsys {
    fn executable(&self) -> &str {
        "dumpsys"
    }

    async fn run(&self, ctx: &ShellContext<'_>, io: &mut dyn ShellIo) -> Result<u8, ProtocolError> {
        let words = ctx.words();
        let output = match words.split_first() {
            None => {
                let mut output = String::from("Currently running services:\n");
                for service in SERVICES {
                    output.push_str(&format!("  {}\n", service));
                }
                output
            }
            Some((service, rest)) if service == "package" => {
                dump_packages(ctx, rest.first().map(String::as_str))
            }
            Some((service, _)) if SERVICES.contains(&service.as_str()) => String::new(),
            Some((service, _)) => {
                io.write_stderr(format!("Can't find service: {}\n", service).as_bytes())
                    .await?;
                return Ok(0);
            }
        };

        io.write_stdout(output.as_bytes()).await?;
        Ok(0)
    }
}

fn dump_packages(ctx: &ShellContext<'_>, only: Option<&str>) -> String {
    ctx.device.with_packages(|pm| {
        if let Some(name) = only {
            if !pm.is_installed(name) {
                return format!("Unable to find package: {}\n", name);
            }
        }

        let mut output = String::from("Packages:\n");
        for (index, name) in pm.names().iter().enumerate() {
            if only.is_some_and(|only| only != name.as_str()) {
                continue;
            }
            let paths = pm.paths(name);
            let code_path = paths
                .first()
                .and_then(|p| p.rsplit_once('/').map(|(dir, _)| dir.to_string()))
                .unwrap_or_else(|| format!("/data/app/{}", name));

            output.push_str(&format!("  Package [{}] ({:08x}):\n", name, index + 1));
            output.push_str(&format!("    userId={}\n", FIRST_APPLICATION_UID + index));
            output.push_str(&format!("    codePath={}\n", code_path));
            if paths.len() > 1 {
                output.push_str(&format!("    splits=[{}]\n", paths.len()));
            }
        }
        output
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::commands::testing::{device, pixel, run, CapturedIo};

    #[tokio::test]
    async fn test_dumpsys_package() {
        let device = device(
            pixel()
                .with_package("com.example", "/data/app/com.example-1/base.apk")
                .with_package("org.other", "/data/app/org.other/base.apk"),
        );

        let mut io = CapturedIo::default();
        assert_eq!(run(&Dumpsys, &device, "package", &mut io).await, 0);
        let out = io.stdout_text();
        assert!(out.starts_with("Packages:\n"));
        assert!(out.contains("  Package [com.example] (00000001):\n"));
        assert!(out.contains("    codePath=/data/app/com.example-1\n"));
        assert!(out.contains("Package [org.other]"));

        let mut io = CapturedIo::default();
        run(&Dumpsys, &device, "package org.other", &mut io).await;
        assert!(!io.stdout_text().contains("com.example"));

        let mut io = CapturedIo::default();
        run(&Dumpsys, &device, "package com.missing", &mut io).await;
        assert_eq!(io.stdout_text(), "Unable to find package: com.missing\n");
    }

    #[tokio::test]
    async fn test_dumpsys_unknown_service() {
        let device = device(pixel());
        let mut io = CapturedIo::default();
        run(&Dumpsys, &device, "battery", &mut io).await;
        assert_eq!(io.stderr_text(), "Can't find service: battery\n");
    }
}
