//! Command identifiers understood by the remote device

use std::fmt;

/// Command sent to (or answered by) the remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Command {
    /// Client settings and public key, RSA-encrypted for the remote device
    SetClient = 0,
    Authentication = 1,
    /// Remote device hands over the session key material
    Pair = 2,
    /// Polled with a plain GET
    GetPushNotifications = 3,
    Error = 4,
    GetDir = 5,
    GetFile = 6,
    Share = 7,
    /// Upload chunk, acknowledged by the remote device
    SetFile = 8,
    Delete = 9,
    Rename = 10,
    Move = 11,
    Copy = 12,
    CreateDir = 13,
    Search = 14,
    GetGroup = 15,
    AddToGroup = 16,
    RemoveFromGroup = 17,
    GetStorageInfo = 18,
    GetOccupiedSpace = 19,
    /// Fetches the remote public key, protected by the QR key
    GetEncryptedQR = 20,
}

impl Command {
    /// Numeric id written in the 4-byte wire header
    pub fn id(self) -> i32 {
        self as i32
    }

    /// Look up a command by its wire id
    pub fn from_id(id: i32) -> Option<Self> {
        let command = match id {
            0 => Self::SetClient,
            1 => Self::Authentication,
            2 => Self::Pair,
            3 => Self::GetPushNotifications,
            4 => Self::Error,
            5 => Self::GetDir,
            6 => Self::GetFile,
            7 => Self::Share,
            8 => Self::SetFile,
            9 => Self::Delete,
            10 => Self::Rename,
            11 => Self::Move,
            12 => Self::Copy,
            13 => Self::CreateDir,
            14 => Self::Search,
            15 => Self::GetGroup,
            16 => Self::AddToGroup,
            17 => Self::RemoveFromGroup,
            18 => Self::GetStorageInfo,
            19 => Self::GetOccupiedSpace,
            20 => Self::GetEncryptedQR,
            _ => return None,
        };
        Some(command)
    }

    /// Name used for the relay's `purpose` query parameter
    pub fn name(self) -> &'static str {
        match self {
            Self::SetClient => "SetClient",
            Self::Authentication => "Authentication",
            Self::Pair => "Pair",
            Self::GetPushNotifications => "GetPushNotifications",
            Self::Error => "Error",
            Self::GetDir => "GetDir",
            Self::GetFile => "GetFile",
            Self::Share => "Share",
            Self::SetFile => "SetFile",
            Self::Delete => "Delete",
            Self::Rename => "Rename",
            Self::Move => "Move",
            Self::Copy => "Copy",
            Self::CreateDir => "CreateDir",
            Self::Search => "Search",
            Self::GetGroup => "GetGroup",
            Self::AddToGroup => "AddToGroup",
            Self::RemoveFromGroup => "RemoveFromGroup",
            Self::GetStorageInfo => "GetStorageInfo",
            Self::GetOccupiedSpace => "GetOccupiedSpace",
            Self::GetEncryptedQR => "GetEncryptedQR",
        }
    }

    /// Pairing commands that travel before a session cipher exists.
    /// They carry `sid` and `purpose` query parameters.
    pub fn is_bootstrap(self) -> bool {
        matches!(self, Self::SetClient | Self::GetEncryptedQR)
    }

    /// The polling command, sent as a bodiless GET
    pub fn is_poll(self) -> bool {
        matches!(self, Self::GetPushNotifications)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display name for a raw id, including ids missing from the table
pub fn command_name(id: i32) -> &'static str {
    Command::from_id(id).map_or("UnknownCommand", Command::name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip_through_table() {
        for id in 0..=20 {
            let command = Command::from_id(id).unwrap();
            assert_eq!(command.id(), id);
        }
        assert_eq!(Command::from_id(21), None);
        assert_eq!(Command::from_id(-1), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(Command::GetEncryptedQR.name(), "GetEncryptedQR");
        assert_eq!(Command::SetFile.to_string(), "SetFile");
        assert_eq!(command_name(99), "UnknownCommand");
    }

    #[test]
    fn test_bootstrap_and_poll_classes() {
        assert!(Command::SetClient.is_bootstrap());
        assert!(Command::GetEncryptedQR.is_bootstrap());
        assert!(!Command::Authentication.is_bootstrap());
        assert!(Command::GetPushNotifications.is_poll());
        assert!(!Command::GetPushNotifications.is_bootstrap());
    }
}
