//! In-process surface of the mask-driven administration API.
//!
//! The gateway never stores principals itself; everything it learns or
//! changes goes through an [`AdminApi`] implementation handed to it at
//! startup.

use std::fmt;

use async_trait::async_trait;
use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Which attributes of a [`PrincipalEntry`] a call reads or writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Mask: u32 {
        const PRINCIPAL = 0x0000_0001;
        const PRINC_EXPIRE_TIME = 0x0000_0002;
        const PW_EXPIRATION = 0x0000_0004;
        const LAST_PWD_CHANGE = 0x0000_0008;
        const ATTRIBUTES = 0x0000_0010;
        const MAX_LIFE = 0x0000_0020;
        const MOD_TIME = 0x0000_0040;
        const MOD_NAME = 0x0000_0080;
        const KVNO = 0x0000_0100;
        const MKVNO = 0x0000_0200;
        const AUX_ATTRIBUTES = 0x0000_0400;
        const POLICY = 0x0000_0800;
        const POLICY_CLR = 0x0000_1000;
        const MAX_RLIFE = 0x0000_2000;
        const KEY_DATA = 0x0002_0000;
        const TL_DATA = 0x0004_0000;
    }
}

impl Mask {
    /// Read-back mask requested after a successful add.
    pub const ADD_READBACK: Mask = Mask::PRINCIPAL
        .union(Mask::PRINC_EXPIRE_TIME)
        .union(Mask::PW_EXPIRATION)
        .union(Mask::MAX_LIFE)
        .union(Mask::KEY_DATA)
        .union(Mask::MOD_TIME)
        .union(Mask::MOD_NAME);
}

/// A principal name: one or more components plus a realm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    components: Vec<String>,
    realm: String,
}

impl Principal {
    pub fn new(components: Vec<String>, realm: impl Into<String>) -> Result<Self, AdminError> {
        if components.is_empty() || components[0].is_empty() {
            return Err(AdminError::BadPrincipal);
        }
        Ok(Self {
            components,
            realm: realm.into(),
        })
    }

    /// Builds a principal from a v4 name/instance pair. An empty instance
    /// yields a single-component name.
    pub fn from_legacy(name: &str, instance: &str, realm: &str) -> Result<Self, AdminError> {
        let mut components = vec![name.to_string()];
        if !instance.is_empty() {
            components.push(instance.to_string());
        }
        Self::new(components, realm)
    }

    /// Splits into the v4 name/instance pair, dropping the realm. Names
    /// with more than two components have no v4 form.
    pub fn to_legacy(&self) -> Option<(String, String)> {
        match self.components.as_slice() {
            [name] => Some((name.clone(), String::new())),
            [name, instance] => Some((name.clone(), instance.clone())),
            _ => None,
        }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.components.join("/"), self.realm)
    }
}

/// Salt type for keys derived from a plain password.
pub const PW_SALT: i32 = 3;

/// The three DES variants a v4 key is installed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyEncType {
    DesCbcMd5,
    DesCbcMd4,
    DesCbcCrc,
}

impl LegacyEncType {
    /// Installation order for a fanned-out v4 key.
    pub const FANOUT: [LegacyEncType; 3] = [
        LegacyEncType::DesCbcMd5,
        LegacyEncType::DesCbcMd4,
        LegacyEncType::DesCbcCrc,
    ];

    pub fn enctype(self) -> i32 {
        match self {
            LegacyEncType::DesCbcCrc => 1,
            LegacyEncType::DesCbcMd4 => 2,
            LegacyEncType::DesCbcMd5 => 3,
        }
    }

    pub fn from_enctype(enctype: i32) -> Option<Self> {
        Self::FANOUT.into_iter().find(|t| t.enctype() == enctype)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Salt {
    pub salt_type: i32,
    pub contents: Vec<u8>,
}

/// One versioned key of a principal.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyData {
    pub version: u16,
    pub kvno: u32,
    pub enctype: i32,
    pub contents: Vec<u8>,
    pub salt: Option<Salt>,
}

impl KeyData {
    /// Installs one raw 8-byte DES key under every legacy DES variant, with
    /// an empty password salt.
    pub fn des_fanout(key: [u8; 8], kvno: u32) -> Vec<KeyData> {
        LegacyEncType::FANOUT
            .into_iter()
            .map(|etype| KeyData {
                version: 2,
                kvno,
                enctype: etype.enctype(),
                contents: key.to_vec(),
                salt: Some(Salt {
                    salt_type: PW_SALT,
                    contents: Vec::new(),
                }),
            })
            .collect()
    }

    /// Raw key bytes if this entry holds a single-DES key.
    pub fn as_des_key(&self) -> Option<[u8; 8]> {
        LegacyEncType::from_enctype(self.enctype)?;
        self.contents.as_slice().try_into().ok()
    }
}

impl fmt::Debug for KeyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyData")
            .field("version", &self.version)
            .field("kvno", &self.kvno)
            .field("enctype", &self.enctype)
            .field("contents", &"<redacted>")
            .field("salt_type", &self.salt.as_ref().map(|s| s.salt_type))
            .finish()
    }
}

/// Mask-addressed principal record. Only the attributes named by the
/// accompanying [`Mask`] are meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalEntry {
    pub principal: Option<Principal>,
    pub princ_expire_time: i64,
    pub pw_expiration: i64,
    pub attributes: u32,
    /// Seconds; 0 means no explicit maximum.
    pub max_life: u32,
    pub key_data: Vec<KeyData>,
    pub mod_date: i64,
    pub mod_name: Option<Principal>,
}

/// Independent per-command privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    ChangePassword,
    Add,
    Get,
    Modify,
    Delete,
}

/// Closed error set of the administration API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum AdminError {
    #[error("operation failed for unspecified reason")]
    Failure,
    #[error("operation requires get privilege")]
    AuthGet,
    #[error("operation requires add privilege")]
    AuthAdd,
    #[error("operation requires modify privilege")]
    AuthModify,
    #[error("operation requires delete privilege")]
    AuthDelete,
    #[error("insufficient authorization for operation")]
    AuthInsufficient,
    #[error("database inconsistency detected")]
    BadDb,
    #[error("principal or policy already exists")]
    Dup,
    #[error("communication failure with server")]
    RpcError,
    #[error("no administration server found for realm")]
    NoSrv,
    #[error("password history principal key version mismatch")]
    BadHistKey,
    #[error("connection to server not initialized")]
    NotInit,
    #[error("principal does not exist")]
    UnkPrinc,
    #[error("password is too short")]
    PassQTooShort,
    #[error("password does not contain enough character classes")]
    PassQClass,
    #[error("password is in the password dictionary")]
    PassQDict,
    #[error("cannot reuse password")]
    PassReuse,
    #[error("current password's minimum life has not expired")]
    PassTooSoon,
    #[error("password is unacceptable")]
    BadPassword,
    #[error("principal is protected")]
    ProtectPrincipal,
    #[error("policy is in use")]
    PolicyRef,
    #[error("connection to server already initialized")]
    Init,
    #[error("policy does not exist")]
    UnkPolicy,
    #[error("invalid field mask for operation")]
    BadMask,
    #[error("invalid number of character classes")]
    BadClass,
    #[error("invalid password length")]
    BadLength,
    #[error("illegal policy name")]
    BadPolicy,
    #[error("illegal principal name")]
    BadPrincipal,
    #[error("invalid auxiliary attributes")]
    BadAuxAttr,
    #[error("invalid password history count")]
    BadHistory,
    #[error("password minimum life is greater than maximum life")]
    BadMinPassLife,
    #[error("invalid server handle")]
    BadServerHandle,
    #[error("invalid struct version")]
    BadStructVersion,
    #[error("struct version too old")]
    OldStructVersion,
    #[error("struct version too new")]
    NewStructVersion,
    #[error("invalid API version")]
    BadApiVersion,
    #[error("library API version too old for server")]
    OldLibApiVersion,
    #[error("server API version too old for library")]
    OldServerApiVersion,
    #[error("library API version too new for server")]
    NewLibApiVersion,
    #[error("server API version too new for library")]
    NewServerApiVersion,
    #[error("database error: required principal missing")]
    SecurePrincMissing,
    #[error("renaming principals with salts is not supported")]
    NoRenameSalt,
    #[error("invalid configuration parameter for remote API")]
    BadClientParams,
    #[error("invalid configuration parameter for local API")]
    BadServerParams,
    #[error("operation requires list privilege")]
    AuthList,
    #[error("operation requires change-password privilege")]
    AuthChangepw,
    #[error("invalid tagged data list element type")]
    BadTlType,
    #[error("required parameters missing from configuration")]
    MissingConfParams,
    #[error("bad krb5 admin server hostname")]
    BadServerName,
}

impl AdminError {
    /// Every variant, for table-completeness checks.
    pub const ALL: [AdminError; 49] = [
        AdminError::Failure,
        AdminError::AuthGet,
        AdminError::AuthAdd,
        AdminError::AuthModify,
        AdminError::AuthDelete,
        AdminError::AuthInsufficient,
        AdminError::BadDb,
        AdminError::Dup,
        AdminError::RpcError,
        AdminError::NoSrv,
        AdminError::BadHistKey,
        AdminError::NotInit,
        AdminError::UnkPrinc,
        AdminError::PassQTooShort,
        AdminError::PassQClass,
        AdminError::PassQDict,
        AdminError::PassReuse,
        AdminError::PassTooSoon,
        AdminError::BadPassword,
        AdminError::ProtectPrincipal,
        AdminError::PolicyRef,
        AdminError::Init,
        AdminError::UnkPolicy,
        AdminError::BadMask,
        AdminError::BadClass,
        AdminError::BadLength,
        AdminError::BadPolicy,
        AdminError::BadPrincipal,
        AdminError::BadAuxAttr,
        AdminError::BadHistory,
        AdminError::BadMinPassLife,
        AdminError::BadServerHandle,
        AdminError::BadStructVersion,
        AdminError::OldStructVersion,
        AdminError::NewStructVersion,
        AdminError::BadApiVersion,
        AdminError::OldLibApiVersion,
        AdminError::OldServerApiVersion,
        AdminError::NewLibApiVersion,
        AdminError::NewServerApiVersion,
        AdminError::SecurePrincMissing,
        AdminError::NoRenameSalt,
        AdminError::BadClientParams,
        AdminError::BadServerParams,
        AdminError::AuthList,
        AdminError::AuthChangepw,
        AdminError::BadTlType,
        AdminError::MissingConfParams,
        AdminError::BadServerName,
    ];
}

/// Principal administration operations the gateway calls into.
///
/// `caller` is always the identity established by the request envelope.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn check_privilege(&self, caller: &Principal, privilege: Privilege) -> Result<(), AdminError>;

    async fn create_principal(
        &self,
        caller: &Principal,
        entry: &PrincipalEntry,
        mask: Mask,
    ) -> Result<(), AdminError>;

    async fn get_principal(&self, principal: &Principal, mask: Mask) -> Result<PrincipalEntry, AdminError>;

    async fn modify_principal(
        &self,
        caller: &Principal,
        entry: &PrincipalEntry,
        mask: Mask,
    ) -> Result<(), AdminError>;

    async fn delete_principal(&self, caller: &Principal, principal: &Principal) -> Result<(), AdminError>;

    /// Sets new keys derived from `password` through string-to-key.
    async fn change_password(
        &self,
        caller: &Principal,
        principal: &Principal,
        password: &str,
    ) -> Result<(), AdminError>;

    /// Installs `keys` verbatim, bypassing string-to-key.
    async fn change_keys(
        &self,
        caller: &Principal,
        principal: &Principal,
        keys: &[KeyData],
    ) -> Result<(), AdminError>;
}
