//! Command dispatch for one decrypted request body.
//!
//! A request moves through `AwaitingOpcode -> Authorizing -> Executing`;
//! the caller then builds the reply from the outcome. The privilege check
//! runs before any record is decoded, so an unauthorized caller learns
//! nothing about the payload's validity or the target's existence.

use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::admin::{AdminApi, AdminError, KeyData, Mask, Principal, Privilege};
use crate::core::observability::ErrorClass;
use crate::kadm_protocol::Opcode;
use crate::legacy::translate::selection_mask;
use crate::legacy::wire::Reader;
use crate::legacy::{CodecError, FieldTranslator, LegacyRecord, PresenceMask};
use crate::legacy_codes::LegacyCode;

/// Longest explicit password accepted by change-password.
pub const MAX_PASSWORD_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingOpcode,
    Authorizing(Opcode),
    Executing(Opcode),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("caller lacks privilege: {0}")]
    Unauthorized(AdminError),
    #[error("malformed request: {0}")]
    Codec(#[from] CodecError),
    #[error("administration call failed: {0}")]
    Execution(AdminError),
}

impl DispatchError {
    pub fn legacy_code(&self) -> LegacyCode {
        match self {
            DispatchError::UnknownOpcode(_) => LegacyCode::NO_OPCODE,
            DispatchError::Unauthorized(_) => LegacyCode::UNAUTH,
            DispatchError::Codec(err) => err.legacy_code(),
            DispatchError::Execution(err) => LegacyCode::from(*err),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DispatchError::UnknownOpcode(_) => ErrorClass::UNKNOWN_OP,
            DispatchError::Unauthorized(_) => ErrorClass::AUTHORIZATION,
            DispatchError::Codec(_) => ErrorClass::CODEC,
            DispatchError::Execution(_) => ErrorClass::EXECUTION,
        }
    }
}

/// Result of dispatching one body, with what the audit line needs.
#[derive(Debug)]
pub struct Dispatched {
    pub operation: &'static str,
    pub target: Option<Principal>,
    /// Encoded reply record; empty for change-password and delete.
    pub result: Result<Vec<u8>, DispatchError>,
}

pub fn required_privilege(opcode: Opcode) -> Privilege {
    match opcode {
        Opcode::ChangePassword => Privilege::ChangePassword,
        Opcode::Add => Privilege::Add,
        Opcode::Modify => Privilege::Modify,
        Opcode::Get => Privilege::Get,
        Opcode::Delete => Privilege::Delete,
    }
}

#[derive(Clone)]
pub struct CommandDispatcher {
    admin: Arc<dyn AdminApi>,
    translator: FieldTranslator,
}

impl CommandDispatcher {
    pub fn new(admin: Arc<dyn AdminApi>, translator: FieldTranslator) -> Self {
        Self { admin, translator }
    }

    pub async fn dispatch(&self, caller: &Principal, body: &[u8]) -> Dispatched {
        let mut reader = Reader::new(body);
        debug!("dispatch stage {:?}", Stage::AwaitingOpcode);

        let opcode = match reader.u8("opcode") {
            Ok(byte) => Opcode::from_byte(byte).ok_or(DispatchError::UnknownOpcode(byte)),
            Err(err) => Err(DispatchError::Codec(err)),
        };
        let opcode = match opcode {
            Ok(opcode) => opcode,
            Err(err) => {
                return Dispatched {
                    operation: "unknown",
                    target: None,
                    result: Err(err),
                }
            }
        };

        let mut target = None;
        let result = self.run(opcode, caller, &mut reader, &mut target).await;
        Dispatched {
            operation: opcode.name(),
            target,
            result,
        }
    }

    async fn run(
        &self,
        opcode: Opcode,
        caller: &Principal,
        reader: &mut Reader<'_>,
        target: &mut Option<Principal>,
    ) -> Result<Vec<u8>, DispatchError> {
        debug!("dispatch stage {:?}", Stage::Authorizing(opcode));
        self.admin
            .check_privilege(caller, required_privilege(opcode))
            .await
            .map_err(DispatchError::Unauthorized)?;

        debug!("dispatch stage {:?}", Stage::Executing(opcode));
        match opcode {
            Opcode::ChangePassword => {
                *target = Some(caller.clone());
                self.change_password(caller, reader).await
            }
            Opcode::Add => self.add(caller, reader, target).await,
            Opcode::Get => self.get(reader, target).await,
            Opcode::Modify => self.modify(caller, reader, target).await,
            Opcode::Delete => self.delete(caller, reader, target).await,
        }
    }

    /// `[8 key bytes][optional password]`, always applied to the caller.
    async fn change_password(&self, caller: &Principal, reader: &mut Reader<'_>) -> Result<Vec<u8>, DispatchError> {
        let key = reader.array::<8>("key")?;
        let password = if reader.is_empty() {
            None
        } else {
            Some(reader.string("password", MAX_PASSWORD_LEN)?)
        };

        let outcome = match password {
            Some(password) => self.admin.change_password(caller, caller, &password).await,
            None => {
                let keys = KeyData::des_fanout(key, 0);
                self.admin.change_keys(caller, caller, &keys).await
            }
        };
        outcome.map_err(DispatchError::Execution)?;
        Ok(Vec::new())
    }

    async fn add(
        &self,
        caller: &Principal,
        reader: &mut Reader<'_>,
        target: &mut Option<Principal>,
    ) -> Result<Vec<u8>, DispatchError> {
        let record = LegacyRecord::read_from(reader)?;
        let principal = self.translator.principal(&record)?;
        *target = Some(principal.clone());
        let (entry, mask) = self.translator.to_modern(&record)?;

        self.admin
            .create_principal(caller, &entry, mask)
            .await
            .map_err(DispatchError::Execution)?;
        self.read_back(&principal, Mask::ADD_READBACK).await
    }

    /// A record (only its principal matters) followed by the four
    /// selection bytes.
    async fn get(&self, reader: &mut Reader<'_>, target: &mut Option<Principal>) -> Result<Vec<u8>, DispatchError> {
        let record = LegacyRecord::read_from(reader)?;
        let principal = self.translator.principal(&record)?;
        *target = Some(principal.clone());
        let selection = PresenceMask::from_selection_bytes(reader.array::<4>("field selection")?);

        self.read_back(&principal, selection_mask(selection)).await
    }

    /// Two records; the first describes the prior state and is ignored.
    async fn modify(
        &self,
        caller: &Principal,
        reader: &mut Reader<'_>,
        target: &mut Option<Principal>,
    ) -> Result<Vec<u8>, DispatchError> {
        let _prior = LegacyRecord::read_from(reader)?;
        let record = LegacyRecord::read_from(reader)?;
        let principal = self.translator.principal(&record)?;
        *target = Some(principal.clone());
        let (entry, mask) = self.translator.to_modern(&record)?;

        self.admin
            .modify_principal(caller, &entry, mask)
            .await
            .map_err(DispatchError::Execution)?;
        self.read_back(&principal, mask).await
    }

    async fn delete(
        &self,
        caller: &Principal,
        reader: &mut Reader<'_>,
        target: &mut Option<Principal>,
    ) -> Result<Vec<u8>, DispatchError> {
        let record = LegacyRecord::read_from(reader)?;
        let principal = self.translator.principal(&record)?;
        *target = Some(principal.clone());

        self.admin
            .delete_principal(caller, &principal)
            .await
            .map_err(DispatchError::Execution)?;
        Ok(Vec::new())
    }

    async fn read_back(&self, principal: &Principal, mask: Mask) -> Result<Vec<u8>, DispatchError> {
        let entry = self
            .admin
            .get_principal(principal, mask)
            .await
            .map_err(DispatchError::Execution)?;
        let record = self.translator.from_modern(&entry, mask)?;
        Ok(record.encode())
    }
}
