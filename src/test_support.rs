//! In-memory collaborators for unit and session tests.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::admin::{AdminApi, AdminError, KeyData, Mask, Principal, PrincipalEntry, Privilege};
use crate::envelope::{
    CipherError, ClaimedIdentity, PeerAddrs, SessionCipher, TicketError, TicketGrant, TicketVerifier,
};
use crate::kadm_protocol::{ERROR_MARKER, VERSION_MARKER};
use crate::key_management::{ServiceKey, SessionKey};

pub const SESSION_KEY: [u8; 8] = [0x13, 0x57, 0x9b, 0xdf, 0x02, 0x46, 0x8a, 0xce];

pub fn addrs() -> PeerAddrs {
    PeerAddrs {
        client: "192.0.2.10:1025".parse().unwrap(),
        gateway: "192.0.2.1:751".parse().unwrap(),
    }
}

fn xor(data: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ SESSION_KEY[i % SESSION_KEY.len()])
        .collect()
}

fn keyed_sum(data: &[u8], key: &[u8; 8]) -> u32 {
    data.iter().enumerate().fold(0u32, |acc, (i, b)| {
        acc.wrapping_mul(31).wrapping_add(u32::from(b ^ key[i % key.len()]))
    })
}

/// Request payload for `body` as a client holding [`SESSION_KEY`] would
/// build it. The authenticator is just the big-endian checksum.
pub fn seal_request(body: &[u8]) -> Vec<u8> {
    let encrypted = xor(body);
    let checksum = keyed_sum(&encrypted, &SESSION_KEY);

    let mut payload = VERSION_MARKER.to_vec();
    payload.extend_from_slice(&4u32.to_be_bytes());
    payload.extend_from_slice(&checksum.to_be_bytes());
    payload.extend_from_slice(&encrypted);
    payload
}

/// Splits a reply payload into the decrypted record bytes or the error
/// code it carries.
pub fn open_reply(reply: &[u8]) -> Result<Vec<u8>, i32> {
    assert_eq!(&reply[..4], &VERSION_MARKER, "reply without version marker");
    if reply[4..].starts_with(&ERROR_MARKER) {
        let code: [u8; 4] = reply[10..14].try_into().unwrap();
        return Err(i32::from_be_bytes(code));
    }
    let plain = CountingCipher::unseal(&reply[4..]);
    assert_eq!(&plain[..4], &[0, 0, 0, 0], "nonzero success status");
    Ok(plain[4..].to_vec())
}

/// Accepts any authenticator carrying a 4-byte checksum and vouches for a
/// fixed identity.
pub struct FixedVerifier {
    identity: Option<ClaimedIdentity>,
    reject_code: i32,
}

impl FixedVerifier {
    pub fn for_user(name: &str, instance: &str) -> Self {
        Self {
            identity: Some(ClaimedIdentity::new(name, instance, "")),
            reject_code: 0,
        }
    }

    pub fn rejecting(code: i32) -> Self {
        Self {
            identity: None,
            reject_code: code,
        }
    }
}

impl TicketVerifier for FixedVerifier {
    fn read_request(
        &self,
        authenticator: &[u8],
        _service_key: &ServiceKey,
        _client: IpAddr,
    ) -> Result<TicketGrant, TicketError> {
        let identity = self.identity.clone().ok_or(TicketError {
            code: self.reject_code,
        })?;
        let checksum: [u8; 4] = authenticator
            .try_into()
            .map_err(|_| TicketError { code: 7 })?;
        Ok(TicketGrant {
            session_key: SessionKey::new(SESSION_KEY),
            checksum: u32::from_be_bytes(checksum),
            identity,
        })
    }
}

/// XOR "cipher" that counts its calls.
#[derive(Default)]
pub struct CountingCipher {
    decrypts: AtomicUsize,
    encrypts: AtomicUsize,
    fail_encrypt: bool,
    last_encrypt: Mutex<Option<(SocketAddr, SocketAddr)>>,
}

impl CountingCipher {
    pub fn failing_encrypt() -> Self {
        Self {
            fail_encrypt: true,
            ..Default::default()
        }
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypts.load(Ordering::SeqCst)
    }

    /// Sender and receiver of the last encrypt call.
    pub fn last_encrypt(&self) -> Option<(SocketAddr, SocketAddr)> {
        *self.last_encrypt.lock().unwrap()
    }

    pub fn unseal(data: &[u8]) -> Vec<u8> {
        xor(data)
    }
}

impl SessionCipher for CountingCipher {
    fn checksum(&self, data: &[u8], key: &SessionKey) -> u32 {
        keyed_sum(data, key.as_bytes())
    }

    fn decrypt(
        &self,
        data: &[u8],
        _key: &SessionKey,
        _sender: SocketAddr,
        _receiver: SocketAddr,
    ) -> Result<Vec<u8>, TicketError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        Ok(xor(data))
    }

    fn encrypt(
        &self,
        data: &[u8],
        _key: &SessionKey,
        sender: SocketAddr,
        receiver: SocketAddr,
    ) -> Result<Vec<u8>, CipherError> {
        self.encrypts.fetch_add(1, Ordering::SeqCst);
        *self.last_encrypt.lock().unwrap() = Some((sender, receiver));
        if self.fail_encrypt {
            return Err(CipherError);
        }
        Ok(xor(data))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCall {
    CheckPrivilege(Principal, Privilege),
    Create(Principal, Mask),
    Get(Principal, Mask),
    Modify(Principal, Mask),
    Delete(Principal),
    ChangePassword(Principal),
    ChangeKeys(Principal, usize),
}

/// Principal store with per-caller privilege grants and a call log.
pub struct MockAdmin {
    store: Mutex<HashMap<Principal, PrincipalEntry>>,
    grants: Mutex<HashMap<Principal, HashSet<Privilege>>>,
    calls: Mutex<Vec<AdminCall>>,
}

impl MockAdmin {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
            grants: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn grant(&self, caller: &Principal, privileges: &[Privilege]) {
        self.grants
            .lock()
            .unwrap()
            .entry(caller.clone())
            .or_default()
            .extend(privileges.iter().copied());
    }

    pub fn insert(&self, entry: PrincipalEntry) {
        let principal = entry.principal.clone().expect("stored entries are named");
        self.store.lock().unwrap().insert(principal, entry);
    }

    pub fn entry(&self, principal: &Principal) -> Option<PrincipalEntry> {
        self.store.lock().unwrap().get(principal).cloned()
    }

    pub fn calls(&self) -> Vec<AdminCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, AdminCall::Create(..)))
            .count()
    }

    fn log(&self, call: AdminCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AdminApi for MockAdmin {
    async fn check_privilege(&self, caller: &Principal, privilege: Privilege) -> Result<(), AdminError> {
        self.log(AdminCall::CheckPrivilege(caller.clone(), privilege));
        let granted = self
            .grants
            .lock()
            .unwrap()
            .get(caller)
            .is_some_and(|set| set.contains(&privilege));
        if granted {
            Ok(())
        } else {
            Err(AdminError::AuthInsufficient)
        }
    }

    async fn create_principal(
        &self,
        caller: &Principal,
        entry: &PrincipalEntry,
        mask: Mask,
    ) -> Result<(), AdminError> {
        let principal = entry.principal.clone().ok_or(AdminError::BadPrincipal)?;
        self.log(AdminCall::Create(principal.clone(), mask));
        let mut store = self.store.lock().unwrap();
        if store.contains_key(&principal) {
            return Err(AdminError::Dup);
        }
        let mut stored = entry.clone();
        stored.mod_name = Some(caller.clone());
        store.insert(principal, stored);
        Ok(())
    }

    async fn get_principal(&self, principal: &Principal, mask: Mask) -> Result<PrincipalEntry, AdminError> {
        self.log(AdminCall::Get(principal.clone(), mask));
        self.entry(principal).ok_or(AdminError::UnkPrinc)
    }

    async fn modify_principal(
        &self,
        caller: &Principal,
        entry: &PrincipalEntry,
        mask: Mask,
    ) -> Result<(), AdminError> {
        let principal = entry.principal.clone().ok_or(AdminError::BadPrincipal)?;
        self.log(AdminCall::Modify(principal.clone(), mask));
        let mut store = self.store.lock().unwrap();
        let stored = store.get_mut(&principal).ok_or(AdminError::UnkPrinc)?;
        if mask.contains(Mask::PRINC_EXPIRE_TIME) {
            stored.princ_expire_time = entry.princ_expire_time;
        }
        if mask.contains(Mask::PW_EXPIRATION) {
            stored.pw_expiration = entry.pw_expiration;
        }
        if mask.contains(Mask::ATTRIBUTES) {
            stored.attributes = entry.attributes;
        }
        if mask.contains(Mask::MAX_LIFE) {
            stored.max_life = entry.max_life;
        }
        if mask.contains(Mask::KEY_DATA) {
            stored.key_data = entry.key_data.clone();
        }
        stored.mod_name = Some(caller.clone());
        Ok(())
    }

    async fn delete_principal(&self, _caller: &Principal, principal: &Principal) -> Result<(), AdminError> {
        self.log(AdminCall::Delete(principal.clone()));
        self.store
            .lock()
            .unwrap()
            .remove(principal)
            .map(|_| ())
            .ok_or(AdminError::UnkPrinc)
    }

    async fn change_password(
        &self,
        _caller: &Principal,
        principal: &Principal,
        password: &str,
    ) -> Result<(), AdminError> {
        self.log(AdminCall::ChangePassword(principal.clone()));
        if password.len() < 4 {
            return Err(AdminError::PassQTooShort);
        }
        Ok(())
    }

    async fn change_keys(
        &self,
        _caller: &Principal,
        principal: &Principal,
        keys: &[KeyData],
    ) -> Result<(), AdminError> {
        self.log(AdminCall::ChangeKeys(principal.clone(), keys.len()));
        if let Some(stored) = self.store.lock().unwrap().get_mut(principal) {
            stored.key_data = keys.to_vec();
        }
        Ok(())
    }
}
