//! ADB wire protocol
//!
//! Byte-level framing shared by the fake server and by test clients:
//!
//! - [`wire`]: host requests (`<4 hex digits><request>`) and the
//!   `OKAY`/`FAIL` handshake
//! - [`shell_v2`]: the framed shell protocol (`<kind><u32 LE length><payload>`)
//! - [`sync`]: the file sync sub-protocol (`<4 byte id><u32 LE length>`)

pub mod error;
pub mod shell_v2;
pub mod socket;
pub mod sync;
pub mod wire;

pub use error::{ProtocolError, Result};
pub use shell_v2::{Packet, PacketKind};
pub use socket::AdbSocket;
pub use wire::Status;
