//! Package manager model
//!
//! Backs `pm` and `cmd package`: installed packages with their APK paths,
//! device users, and split-install sessions.

use std::collections::BTreeMap;

use crate::error::DeviceError;

/// A device user as printed by `pm list users`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: u32,
    pub name: String,
    pub flags: u32,
    pub running: bool,
}

/// A pending `install-create` session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstallSession {
    pub id: u32,
    /// Package named with `-p` at creation, if any
    pub package: Option<String>,
    /// Split names written with `install-write`, with their sizes
    pub splits: Vec<(String, u64)>,
}

/// Installed packages, users and install sessions of one device
#[derive(Debug, Clone)]
pub struct PackageManager {
    packages: BTreeMap<String, Vec<String>>,
    users: Vec<UserInfo>,
    sessions: BTreeMap<u32, InstallSession>,
    next_session_id: u32,
}

impl PackageManager {
    pub fn new() -> Self {
        Self {
            packages: BTreeMap::new(),
            users: vec![UserInfo {
                id: 0,
                name: "Owner".to_string(),
                flags: 0xc13,
                running: true,
            }],
            sessions: BTreeMap::new(),
            next_session_id: 1,
        }
    }

    /// Install or replace a package
    pub fn install(&mut self, name: impl Into<String>, paths: Vec<String>) {
        self.packages.insert(name.into(), paths);
    }

    pub fn uninstall(&mut self, name: &str) -> bool {
        self.packages.remove(name).is_some()
    }

    /// APK paths of a package; empty if it is not installed
    pub fn paths(&self, name: &str) -> Vec<String> {
        self.packages.get(name).cloned().unwrap_or_default()
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Installed package names, sorted
    pub fn names(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    pub fn users(&self) -> &[UserInfo] {
        &self.users
    }

    pub fn add_user(&mut self, user: UserInfo) {
        self.users.retain(|u| u.id != user.id);
        self.users.push(user);
        self.users.sort_by_key(|u| u.id);
    }

    /// Open an install session, returning its id
    pub fn create_session(&mut self, package: Option<String>) -> u32 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.sessions.insert(
            id,
            InstallSession {
                id,
                package,
                splits: Vec::new(),
            },
        );
        id
    }

    pub fn session(&self, id: u32) -> Option<&InstallSession> {
        self.sessions.get(&id)
    }

    /// Record a split written into a session
    pub fn write_session(
        &mut self,
        id: u32,
        split: impl Into<String>,
        size: u64,
    ) -> Result<(), DeviceError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(DeviceError::UnknownSession(id))?;
        session.splits.push((split.into(), size));
        Ok(())
    }

    /// Close a session. When it names a package, the package is installed
    /// with one APK path per written split.
    pub fn commit_session(&mut self, id: u32) -> Result<InstallSession, DeviceError> {
        let session = self
            .sessions
            .remove(&id)
            .ok_or(DeviceError::UnknownSession(id))?;

        if let Some(package) = &session.package {
            let mut paths: Vec<String> = session
                .splits
                .iter()
                .map(|(split, _)| format!("/data/app/{}/{}.apk", package, split))
                .collect();
            if paths.is_empty() {
                paths.push(format!("/data/app/{}/base.apk", package));
            }
            self.install(package.clone(), paths);
        }
        Ok(session)
    }

    pub fn abandon_session(&mut self, id: u32) -> Result<(), DeviceError> {
        self.sessions
            .remove(&id)
            .map(|_| ())
            .ok_or(DeviceError::UnknownSession(id))
    }
}

impl Default for PackageManager {
    fn default() -> Self {
        Self::new()
    }
}
