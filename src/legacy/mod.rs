//! v4 kadmin field codec: the fixed-field record, its wire encoding, and
//! its translation to and from [`crate::admin::PrincipalEntry`].

pub mod lifetime;
pub mod record;
pub mod translate;
pub mod wire;

use thiserror::Error;

use crate::legacy_codes::LegacyCode;

pub use record::{DesKey, LegacyRecord, PresenceMask, Slot};
pub use translate::FieldTranslator;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated {field}: need {needed} bytes, {remaining} left")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("{field} is not valid UTF-8")]
    InvalidString { field: &'static str },
    #[error("invalid principal: {0}")]
    InvalidPrincipal(&'static str),
}

impl CodecError {
    pub fn legacy_code(&self) -> LegacyCode {
        match self {
            CodecError::Truncated { .. } | CodecError::FieldTooLong { .. } => LegacyCode::LENGTH_ERROR,
            CodecError::InvalidString { .. } | CodecError::InvalidPrincipal(_) => LegacyCode::UNAUTH,
        }
    }
}
