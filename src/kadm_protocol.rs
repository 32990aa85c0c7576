/// Marker that opens every request and reply payload.
pub const VERSION_MARKER: [u8; 4] = *b"KADM";

/// Marker that follows the version marker in a plaintext error reply.
pub const ERROR_MARKER: [u8; 6] = *b"KULOSE";

/// Number of version-marker bytes the acceptor consumes before the first
/// frame is handed to a session.
pub const SNIFFED_TAG_LEN: usize = 2;

/// Leading bytes of the version marker, as seen by the acceptor.
pub const LEGACY_TAG: [u8; SNIFFED_TAG_LEN] = [VERSION_MARKER[0], VERSION_MARKER[1]];

/// One-byte command selector at the start of a decrypted request body.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    ChangePassword = 0x02,
    Add = 0x03,
    Modify = 0x04,
    Get = 0x05,
    Delete = 0x08,
}

impl Opcode {
    pub const ALL: [Opcode; 5] = [
        Opcode::ChangePassword,
        Opcode::Add,
        Opcode::Modify,
        Opcode::Get,
        Opcode::Delete,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| *op as u8 == byte)
    }

    /// Operation name used in the per-request audit line.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::ChangePassword => "changepw",
            Opcode::Add => "add",
            Opcode::Modify => "mod",
            Opcode::Get => "get",
            Opcode::Delete => "del",
        }
    }
}
