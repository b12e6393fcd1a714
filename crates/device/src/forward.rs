//! Port forwards
//!
//! `adb forward` and `adb reverse` rules for one device. Nothing is
//! actually listened on; the table only records what clients asked for so
//! that `list-forward` and `killforward` answer consistently.

use crate::error::DeviceError;

/// Socket kinds adb accepts in a forward spec
const SOCKET_KINDS: &[&str] = &[
    "tcp",
    "localabstract",
    "localreserved",
    "localfilesystem",
    "dev",
    "jdwp",
    "vsock",
    "acceptfd",
];

/// One `<local> -> <remote>` rule. For reverse rules `local` is the device
/// side and `remote` the host side, as adb prints them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRule {
    pub local: String,
    pub remote: String,
}

/// Check a socket spec such as `tcp:8080` or `localabstract:foo`
pub fn validate_spec(spec: &str) -> Result<(), DeviceError> {
    let malformed = || DeviceError::MalformedSocketSpec(spec.to_string());
    let (kind, address) = spec.split_once(':').ok_or_else(malformed)?;
    if address.is_empty() || !SOCKET_KINDS.contains(&kind) {
        return Err(malformed());
    }
    let numeric = match kind {
        "tcp" => address.parse::<u16>().is_ok(),
        "jdwp" => address.parse::<u32>().is_ok(),
        _ => true,
    };
    if numeric {
        Ok(())
    } else {
        Err(malformed())
    }
}

/// Ordered set of rules keyed by their local spec
#[derive(Debug, Default)]
pub struct ForwardTable {
    rules: Vec<ForwardRule>,
}

impl ForwardTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rule for `local`. With `rebind` unset an existing
    /// rule for `local` is an error.
    pub fn add(&mut self, local: &str, remote: &str, rebind: bool) -> Result<(), DeviceError> {
        validate_spec(local)?;
        validate_spec(remote)?;

        match self.rules.iter_mut().find(|r| r.local == local) {
            Some(_) if !rebind => Err(DeviceError::CannotRebind(local.to_string())),
            Some(rule) => {
                rule.remote = remote.to_string();
                Ok(())
            }
            None => {
                self.rules.push(ForwardRule {
                    local: local.to_string(),
                    remote: remote.to_string(),
                });
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, local: &str) -> Result<ForwardRule, DeviceError> {
        let index = self
            .rules
            .iter()
            .position(|r| r.local == local)
            .ok_or_else(|| DeviceError::ListenerNotFound(local.to_string()))?;
        Ok(self.rules.remove(index))
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Rules in the order they were first added
    pub fn rules(&self) -> &[ForwardRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_spec() {
        assert!(validate_spec("tcp:8080").is_ok());
        assert!(validate_spec("localabstract:chrome_devtools_remote").is_ok());
        assert!(validate_spec("jdwp:1234").is_ok());
        assert!(validate_spec("tcp:99999").is_err());
        assert!(validate_spec("tcp:").is_err());
        assert!(validate_spec("udp:53").is_err());
        assert!(validate_spec("8080").is_err());
    }

    #[test]
    fn test_add_and_rebind() {
        let mut table = ForwardTable::new();
        table.add("tcp:6000", "tcp:7000", true).unwrap();
        assert_eq!(
            table.add("tcp:6000", "tcp:7001", false),
            Err(DeviceError::CannotRebind("tcp:6000".into()))
        );
        assert_eq!(table.rules()[0].remote, "tcp:7000");

        table.add("tcp:6000", "tcp:7001", true).unwrap();
        assert_eq!(table.rules().len(), 1);
        assert_eq!(table.rules()[0].remote, "tcp:7001");
    }

    #[test]
    fn test_remove_and_clear() {
        let mut table = ForwardTable::new();
        table.add("tcp:6000", "tcp:7000", true).unwrap();
        table.add("tcp:6001", "localabstract:foo", true).unwrap();

        assert_eq!(table.remove("tcp:6000").unwrap().remote, "tcp:7000");
        assert_eq!(
            table.remove("tcp:6000"),
            Err(DeviceError::ListenerNotFound("tcp:6000".into()))
        );
        table.clear();
        assert!(table.is_empty());
    }
}
