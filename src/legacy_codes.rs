//! Legacy kadmin error-code space and the translation into it.
//!
//! Two tables feed the same 32-bit reply field: the kadmin table (its own
//! base, plus two gateway-local negative codes) and the ticket library's
//! table, which keeps its own base so the two never collide.

use std::fmt;

use crate::admin::AdminError;

/// Error-table base of the v4 kadmin codes.
pub const KADM_ERR_BASE: i32 = -1_783_126_272;

/// Error-table base of the v4 ticket library codes.
pub const KRB_ERR_BASE: i32 = 39_525_376;

/// A code as it travels in the error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LegacyCode(pub i32);

impl LegacyCode {
    const fn kadm(offset: i32) -> Self {
        LegacyCode(KADM_ERR_BASE + offset)
    }

    pub const NO_AUTH: LegacyCode = LegacyCode::kadm(5);
    pub const BAD_VER: LegacyCode = LegacyCode::kadm(8);
    pub const BAD_CHK: LegacyCode = LegacyCode::kadm(9);
    pub const NO_SERV: LegacyCode = LegacyCode::kadm(14);
    pub const NO_CONN: LegacyCode = LegacyCode::kadm(16);
    pub const INUSE: LegacyCode = LegacyCode::kadm(20);
    pub const UK_RERROR: LegacyCode = LegacyCode::kadm(22);
    pub const UNAUTH: LegacyCode = LegacyCode::kadm(23);
    pub const NOENTRY: LegacyCode = LegacyCode::kadm(25);
    pub const LENGTH_ERROR: LegacyCode = LegacyCode::kadm(29);
    pub const INSECURE_PW: LegacyCode = LegacyCode::kadm(32);
    pub const IMMUTABLE: LegacyCode = LegacyCode::kadm(35);
    pub const PASS_Q_TOOSHORT: LegacyCode = LegacyCode::kadm(37);
    pub const PASS_Q_CLASS: LegacyCode = LegacyCode::kadm(38);
    pub const PASS_Q_DICT: LegacyCode = LegacyCode::kadm(39);

    /// Gateway-local: opcode byte not recognized.
    pub const NO_OPCODE: LegacyCode = LegacyCode(-1);
    /// Gateway-local: a successful reply could not be sealed.
    pub const NO_ENCRYPT: LegacyCode = LegacyCode(-2);

    /// Ticket-library error `code`, rebased into its own table.
    pub const fn ticket(code: i32) -> Self {
        LegacyCode(KRB_ERR_BASE + code)
    }

    pub fn is_ticket_error(self) -> bool {
        // The ticket table spans 256 codes above its base.
        (KRB_ERR_BASE..KRB_ERR_BASE + 256).contains(&self.0)
    }
}

impl fmt::Display for LegacyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<AdminError> for LegacyCode {
    fn from(err: AdminError) -> Self {
        translate_admin_error(err)
    }
}

/// Total many-to-one map from the administration API's errors.
///
/// Privilege failures and every malformed or unsupported request collapse
/// onto `UNAUTH`, which is the catch-all historical clients expect.
pub fn translate_admin_error(err: AdminError) -> LegacyCode {
    use AdminError::*;
    match err {
        Failure | AuthGet | AuthAdd | AuthModify | AuthDelete | AuthInsufficient => LegacyCode::UNAUTH,
        BadDb => LegacyCode::UK_RERROR,
        Dup => LegacyCode::INUSE,
        RpcError | NoSrv => LegacyCode::NO_SERV,
        NotInit => LegacyCode::NO_CONN,
        UnkPrinc => LegacyCode::NOENTRY,
        PassQTooShort => LegacyCode::PASS_Q_TOOSHORT,
        PassQClass => LegacyCode::PASS_Q_CLASS,
        PassQDict => LegacyCode::PASS_Q_DICT,
        PassReuse | PassTooSoon | BadPassword => LegacyCode::INSECURE_PW,
        ProtectPrincipal => LegacyCode::IMMUTABLE,
        PolicyRef | Init | BadHistKey | UnkPolicy | BadMask | BadClass | BadLength | BadPolicy
        | BadPrincipal | BadAuxAttr | BadHistory | BadMinPassLife | BadServerHandle
        | BadStructVersion | OldStructVersion | NewStructVersion | BadApiVersion
        | OldLibApiVersion | OldServerApiVersion | NewLibApiVersion | NewServerApiVersion
        | SecurePrincMissing | NoRenameSalt | BadClientParams | BadServerParams | AuthList
        | AuthChangepw | BadTlType | MissingConfParams | BadServerName => LegacyCode::UNAUTH,
    }
}
