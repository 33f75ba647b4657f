use std::fmt;

use crate::types::CharacteristicKind;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    /// Snapshot value outside the codec's known range. Recovered locally:
    /// the field update is skipped and the prior cached value retained.
    Decode {
        characteristic: CharacteristicKind,
        raw: f64,
    },
    /// Domain value with no vendor encoding. Unreachable for a closed
    /// domain enum; reaching it is a programming-contract violation.
    Encode {
        characteristic: CharacteristicKind,
        value: f64,
    },
    /// The remote accepted the request but rejected the command.
    Command { data_key: String, code: String },
    /// A "set" was dispatched to a read-only characteristic.
    ReadOnly(CharacteristicKind),
    /// The device's capability profile does not expose this characteristic.
    UnknownCharacteristic(CharacteristicKind),
    UnsupportedProtocol(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Decode { characteristic, raw } => {
                write!(f, "{characteristic}: unsupported API value {raw}")
            }
            Error::Encode { characteristic, value } => {
                write!(f, "{characteristic}: unsupported state {value}")
            }
            Error::Command { data_key, code } => {
                write!(f, "command {data_key} rejected with code {code}")
            }
            Error::ReadOnly(kind) => write!(f, "{kind} is read-only"),
            Error::UnknownCharacteristic(kind) => {
                write!(f, "{kind} is not exposed by this device")
            }
            Error::UnsupportedProtocol(p) => write!(f, "unsupported platform type: {p}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
