//! Request authentication and reply sealing.
//!
//! A request payload is `[KADM][u32 authenticator length][authenticator]
//! [encrypted region]`. Opening it checks the marker, hands the
//! authenticator to a [`TicketVerifier`], verifies the keyed checksum over
//! the encrypted region and only then decrypts it. The ticket and cipher
//! primitives are collaborators; this module only sequences them.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;

use crate::admin::{AdminError, Principal};
use crate::kadm_protocol::{ERROR_MARKER, VERSION_MARKER};
use crate::key_management::{ServiceKey, SessionKey};
use crate::legacy::wire::{Reader, Writer};
use crate::legacy_codes::LegacyCode;

/// Identity a ticket claims, as the legacy triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedIdentity {
    pub name: String,
    pub instance: String,
    pub realm: String,
}

impl ClaimedIdentity {
    pub fn new(name: impl Into<String>, instance: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: instance.into(),
            realm: realm.into(),
        }
    }

    /// The caller principal. A ticket without a realm falls back to
    /// `default_realm`.
    pub fn principal(&self, default_realm: &str) -> Result<Principal, AdminError> {
        let realm = if self.realm.is_empty() {
            default_realm
        } else {
            &self.realm
        };
        Principal::from_legacy(&self.name, &self.instance, realm)
    }
}

/// What a verified ticket yields.
#[derive(Debug)]
pub struct TicketGrant {
    pub session_key: SessionKey,
    /// Checksum the authenticator carries for the encrypted region.
    pub checksum: u32,
    pub identity: ClaimedIdentity,
}

/// Numeric failure from the legacy ticket routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ticket error {code}")]
pub struct TicketError {
    pub code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session encryption failed")]
pub struct CipherError;

/// Legacy ticket parsing and validation.
pub trait TicketVerifier: Send + Sync {
    fn read_request(
        &self,
        authenticator: &[u8],
        service_key: &ServiceKey,
        client: IpAddr,
    ) -> Result<TicketGrant, TicketError>;
}

/// Session-key primitives: keyed checksum and the private-message
/// encrypt/decrypt pair bound to a sender/receiver address pair.
pub trait SessionCipher: Send + Sync {
    fn checksum(&self, data: &[u8], key: &SessionKey) -> u32;

    fn decrypt(
        &self,
        data: &[u8],
        key: &SessionKey,
        sender: SocketAddr,
        receiver: SocketAddr,
    ) -> Result<Vec<u8>, TicketError>;

    fn encrypt(
        &self,
        data: &[u8],
        key: &SessionKey,
        sender: SocketAddr,
        receiver: SocketAddr,
    ) -> Result<Vec<u8>, CipherError>;
}

/// Both ends of the connection a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddrs {
    pub client: SocketAddr,
    pub gateway: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("unsupported version marker")]
    BadVersion,
    #[error("authenticator length {declared} exceeds {available} available bytes")]
    MissingAuthenticator { declared: usize, available: usize },
    #[error("ticket rejected: {0}")]
    Ticket(TicketError),
    #[error("request checksum mismatch")]
    ChecksumMismatch,
    #[error("request decryption failed: {0}")]
    Decrypt(TicketError),
}

impl AuthError {
    pub fn legacy_code(&self) -> LegacyCode {
        match self {
            AuthError::BadVersion => LegacyCode::BAD_VER,
            AuthError::MissingAuthenticator { .. } => LegacyCode::NO_AUTH,
            AuthError::Ticket(e) | AuthError::Decrypt(e) => LegacyCode::ticket(e.code),
            AuthError::ChecksumMismatch => LegacyCode::BAD_CHK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reply could not be sealed")]
pub struct SealError;

impl SealError {
    pub fn legacy_code(&self) -> LegacyCode {
        LegacyCode::NO_ENCRYPT
    }
}

/// Key material scoped to one request/reply pair.
#[derive(Debug)]
pub struct ReplyContext {
    session_key: SessionKey,
    addrs: PeerAddrs,
}

/// An authenticated, decrypted request.
#[derive(Debug)]
pub struct OpenedRequest {
    pub body: Vec<u8>,
    pub identity: ClaimedIdentity,
    pub reply: ReplyContext,
}

#[derive(Clone)]
pub struct EnvelopeSecurity {
    service_key: Arc<ServiceKey>,
    verifier: Arc<dyn TicketVerifier>,
    cipher: Arc<dyn SessionCipher>,
}

impl EnvelopeSecurity {
    pub fn new(
        service_key: Arc<ServiceKey>,
        verifier: Arc<dyn TicketVerifier>,
        cipher: Arc<dyn SessionCipher>,
    ) -> Self {
        Self {
            service_key,
            verifier,
            cipher,
        }
    }

    pub fn open(&self, payload: &[u8], addrs: PeerAddrs) -> Result<OpenedRequest, AuthError> {
        let mut reader = Reader::new(payload);
        let marker = reader
            .take(VERSION_MARKER.len(), "version marker")
            .map_err(|_| AuthError::BadVersion)?;
        if marker != VERSION_MARKER.as_slice() {
            return Err(AuthError::BadVersion);
        }

        let available = reader.remaining();
        let declared = reader.u32("authenticator length").map_err(|_| AuthError::MissingAuthenticator {
            declared: 4,
            available,
        })? as usize;
        let authenticator = reader
            .take(declared, "authenticator")
            .map_err(|_| AuthError::MissingAuthenticator {
                declared,
                available: reader.remaining(),
            })?;
        let encrypted = reader.rest();

        let grant = self
            .verifier
            .read_request(authenticator, &self.service_key, addrs.client.ip())
            .map_err(AuthError::Ticket)?;

        if self.cipher.checksum(encrypted, &grant.session_key) != grant.checksum {
            return Err(AuthError::ChecksumMismatch);
        }

        let body = self
            .cipher
            .decrypt(encrypted, &grant.session_key, addrs.client, addrs.gateway)
            .map_err(AuthError::Decrypt)?;

        Ok(OpenedRequest {
            body,
            identity: grant.identity,
            reply: ReplyContext {
                session_key: grant.session_key,
                addrs,
            },
        })
    }

    /// Encrypts `plaintext` for the client of `context`, addressed from
    /// the gateway back to the client.
    pub fn seal(&self, plaintext: &[u8], context: &ReplyContext) -> Result<Vec<u8>, SealError> {
        self.cipher
            .encrypt(
                plaintext,
                &context.session_key,
                context.addrs.gateway,
                context.addrs.client,
            )
            .map_err(|_| SealError)
    }

    /// `[KADM]` followed by the sealed `[u32 status 0][body]`.
    pub fn success_reply(&self, body: &[u8], context: &ReplyContext) -> Result<Vec<u8>, SealError> {
        let mut plain = Writer::new();
        plain.u32(0).bytes(body);
        let sealed = self.seal(&plain.into_bytes(), context)?;

        let mut out = Writer::new();
        out.bytes(&VERSION_MARKER).bytes(&sealed);
        Ok(out.into_bytes())
    }
}

/// `[KADM][KULOSE][i32 code]`; error replies are never encrypted.
pub fn error_reply(code: LegacyCode) -> Vec<u8> {
    let mut out = Writer::new();
    out.bytes(&VERSION_MARKER).bytes(&ERROR_MARKER).i32(code.0);
    out.into_bytes()
}
