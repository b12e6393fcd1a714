//! Device model errors

/// Errors raised by the device model. The messages double as the reason
/// text sent to clients in a `FAIL` handshake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("device '{0}' not found")]
    NotFound(String),
    #[error("no devices/emulators found")]
    NoDevices,
    #[error("more than one device/emulator")]
    Ambiguous,
    #[error("device '{0}' already attached")]
    Duplicate(String),
    #[error("device {0}")]
    Unavailable(String),
    #[error("No such file or directory: {0}")]
    NoSuchFile(String),
    #[error("Is a directory: {0}")]
    IsDirectory(String),
    #[error("Not a directory: {0}")]
    NotDirectory(String),
    #[error("unknown install session {0}")]
    UnknownSession(u32),
    #[error("cannot bind listener: malformed socket spec '{0}'")]
    MalformedSocketSpec(String),
    #[error("cannot rebind existing socket {0}")]
    CannotRebind(String),
    #[error("listener '{0}' not found")]
    ListenerNotFound(String),
}
