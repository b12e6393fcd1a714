//! Virtual filesystem
//!
//! A flat map of absolute paths to file contents. Directories exist either
//! explicitly (created by `mkdir`, or as ancestors of a written file) or
//! because a file lives beneath them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use crate::error::DeviceError;

/// `S_IFREG`
pub const MODE_FILE: u32 = 0o100000;
/// `S_IFDIR`
pub const MODE_DIR: u32 = 0o040000;

/// Directories every device starts with
const DEFAULT_DIRS: &[&str] = &[
    "/",
    "/data",
    "/data/local",
    "/data/local/tmp",
    "/sdcard",
    "/system",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct VirtualFile {
    data: Vec<u8>,
    mode: u32,
    mtime: i64,
}

/// File metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Type and permission bits
    pub mode: u32,
    pub size: u64,
    /// Seconds since the Unix epoch
    pub mtime: i64,
}

impl FileStat {
    pub fn is_dir(&self) -> bool {
        self.mode & MODE_DIR == MODE_DIR && self.mode & MODE_FILE != MODE_FILE
    }
}

/// In-memory filesystem of one device
#[derive(Debug, Clone)]
pub struct VirtualFs {
    files: BTreeMap<String, VirtualFile>,
    dirs: BTreeSet<String>,
}

/// Normalize to an absolute path without `.`/`..` segments or trailing slash
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{}/", dir)
    }
}

impl VirtualFs {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            dirs: DEFAULT_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn add_ancestors(&mut self, path: &str) {
        let mut current = parent(path);
        while let Some(dir) = current {
            if !self.dirs.insert(dir.to_string()) {
                break;
            }
            current = parent(dir);
        }
    }

    /// Create or replace a file. Missing parent directories are created.
    pub fn write(
        &mut self,
        path: &str,
        data: impl Into<Vec<u8>>,
        mode: u32,
    ) -> Result<(), DeviceError> {
        let path = normalize(path);
        if self.is_dir(&path) {
            return Err(DeviceError::IsDirectory(path));
        }
        self.add_ancestors(&path);
        self.files.insert(
            path,
            VirtualFile {
                data: data.into(),
                mode: mode & 0o7777,
                mtime: Utc::now().timestamp(),
            },
        );
        Ok(())
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>, DeviceError> {
        let path = normalize(path);
        match self.files.get(&path) {
            Some(file) => Ok(file.data.clone()),
            None if self.is_dir(&path) => Err(DeviceError::IsDirectory(path)),
            None => Err(DeviceError::NoSuchFile(path)),
        }
    }

    /// Delete a file by name. Returns whether it existed; deleting a
    /// missing file is a no-op.
    pub fn remove(&mut self, path: &str) -> bool {
        self.files.remove(&normalize(path)).is_some()
    }

    /// Delete a file, or a directory and everything beneath it
    pub fn remove_recursive(&mut self, path: &str) -> bool {
        let path = normalize(path);
        if path == "/" {
            return false;
        }
        let prefix = child_prefix(&path);
        let before = self.files.len() + self.dirs.len();
        self.files
            .retain(|name, _| name != &path && !name.starts_with(&prefix));
        self.dirs
            .retain(|name| name != &path && !name.starts_with(&prefix));
        before != self.files.len() + self.dirs.len()
    }

    pub fn mkdir(&mut self, path: &str) {
        let path = normalize(path);
        self.add_ancestors(&path);
        self.dirs.insert(path);
    }

    pub fn exists(&self, path: &str) -> bool {
        let path = normalize(path);
        self.files.contains_key(&path) || self.is_dir(&path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let path = normalize(path);
        if self.dirs.contains(&path) {
            return true;
        }
        let prefix = child_prefix(&path);
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(name, _)| name.starts_with(&prefix))
    }

    pub fn stat(&self, path: &str) -> Option<FileStat> {
        let path = normalize(path);
        if let Some(file) = self.files.get(&path) {
            return Some(FileStat {
                mode: MODE_FILE | file.mode,
                size: file.data.len() as u64,
                mtime: file.mtime,
            });
        }
        self.is_dir(&path).then(|| FileStat {
            mode: MODE_DIR | 0o755,
            size: 4096,
            mtime: 0,
        })
    }

    /// Immediate children of `dir`, sorted by name
    pub fn list(&self, dir: &str) -> Result<Vec<(String, FileStat)>, DeviceError> {
        let dir = normalize(dir);
        if !self.is_dir(&dir) {
            return if self.files.contains_key(&dir) {
                Err(DeviceError::NotDirectory(dir))
            } else {
                Err(DeviceError::NoSuchFile(dir))
            };
        }

        let prefix = child_prefix(&dir);
        let names: BTreeSet<&str> = self
            .files
            .keys()
            .chain(self.dirs.iter())
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .collect();

        Ok(names
            .into_iter()
            .filter_map(|name| {
                let full = format!("{}{}", prefix, name);
                self.stat(&full).map(|stat| (name.to_string(), stat))
            })
            .collect())
    }

    /// Every regular file as `(path, contents, permission bits)`
    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8], u32)> {
        self.files
            .iter()
            .map(|(path, file)| (path.as_str(), file.data.as_slice(), file.mode))
    }
}

impl Default for VirtualFs {
    fn default() -> Self {
        Self::new()
    }
}
