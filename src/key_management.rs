use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Raw length of a single-DES key.
pub const DES_KEY_LEN: usize = 8;

/// Long-term service key clients' tickets are sealed under.
///
/// Loaded once at startup and shared read-only between connections.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ServiceKey {
    kvno: u8,
    bytes: [u8; DES_KEY_LEN],
}

impl ServiceKey {
    pub fn new(kvno: u8, bytes: [u8; DES_KEY_LEN]) -> Self {
        Self { kvno, bytes }
    }

    pub fn as_bytes(&self) -> &[u8; DES_KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKey")
            .field("kvno", &self.kvno)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

/// Per-request session key recovered from a client's ticket.
///
/// Lives for one request/reply pair; wiped when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; DES_KEY_LEN]);

impl SessionKey {
    pub fn new(bytes: [u8; DES_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DES_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_key_bytes() {
        let service = ServiceKey::new(3, [0xab; DES_KEY_LEN]);
        let session = SessionKey::new([0xcd; DES_KEY_LEN]);

        let rendered = format!("{service:?} {session:?}");
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("171"), "service key bytes leaked: {rendered}");
        assert!(!rendered.contains("205"), "session key bytes leaked: {rendered}");
        assert!(rendered.contains("kvno: 3"));
    }

    #[test]
    fn accessors_return_the_raw_key() {
        let session = SessionKey::new([1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(session.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ServiceKey::new(1, [9; 8]).as_bytes(), &[9; 8]);
    }

    #[test]
    fn zeroize_wipes_key_bytes() {
        let mut session = SessionKey::new([0xcd; DES_KEY_LEN]);
        session.zeroize();
        assert_eq!(session.as_bytes(), &[0; DES_KEY_LEN]);

        let mut service = ServiceKey::new(4, [0xab; DES_KEY_LEN]);
        service.zeroize();
        assert_eq!(service.as_bytes(), &[0; DES_KEY_LEN]);
        assert!(format!("{service:?}").contains("kvno: 0"));
    }

    #[test]
    fn key_types_wipe_on_drop() {
        fn assert_zeroize_on_drop<T: ZeroizeOnDrop>() {}
        assert_zeroize_on_drop::<ServiceKey>();
        assert_zeroize_on_drop::<SessionKey>();
    }
}
