//! Per-connection request loop.
//!
//! One frame in, one frame out, strictly in order. Anything that fails
//! after a frame was read becomes an error reply and the loop continues;
//! only framing failures end the connection.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::admin::AdminApi;
use crate::config::GatewayConfig;
use crate::core::observability::{self, ErrorClass};
use crate::envelope::{error_reply, EnvelopeSecurity, PeerAddrs, SessionCipher, TicketVerifier};
use crate::key_management::ServiceKey;
use crate::legacy::FieldTranslator;
use crate::legacy_codes::LegacyCode;
use crate::protocol_engine::CommandDispatcher;
use crate::transport::{write_frame, FrameError, FrameReader, FrameSource};

/// Everything a connection needs, shared read-only between connections.
#[derive(Clone)]
pub struct GatewayContext {
    realm: String,
    max_frame_len: usize,
    envelope: EnvelopeSecurity,
    dispatcher: CommandDispatcher,
}

impl GatewayContext {
    pub fn new(
        config: &GatewayConfig,
        service_key: ServiceKey,
        verifier: Arc<dyn TicketVerifier>,
        cipher: Arc<dyn SessionCipher>,
        admin: Arc<dyn AdminApi>,
    ) -> Self {
        let translator = FieldTranslator::new(config.realm.clone(), config.extended_fields);
        Self {
            realm: config.realm.clone(),
            max_frame_len: config.max_frame_len,
            envelope: EnvelopeSecurity::new(Arc::new(service_key), verifier, cipher),
            dispatcher: CommandDispatcher::new(admin, translator),
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Turns one request payload into its reply payload.
    pub async fn handle_request(&self, payload: &[u8], addrs: PeerAddrs) -> Vec<u8> {
        let opened = match self.envelope.open(payload, addrs) {
            Ok(opened) => opened,
            Err(err) => {
                observability::record_error(ErrorClass::AUTH);
                warn!("v4-compat {}: request rejected: {}", addrs.client, err);
                return error_reply(err.legacy_code());
            }
        };

        let caller = match opened.identity.principal(&self.realm) {
            Ok(caller) => caller,
            Err(err) => {
                observability::record_error(ErrorClass::AUTH);
                warn!("v4-compat {}: unusable ticket identity: {}", addrs.client, err);
                return error_reply(LegacyCode::from(err));
            }
        };

        let dispatched = self.dispatcher.dispatch(&caller, &opened.body).await;
        let target = dispatched.target.as_ref().unwrap_or(&caller);
        info!("v4-compat {}: {} {}", caller, dispatched.operation, target);

        match dispatched.result {
            Ok(record) => match self.envelope.success_reply(&record, &opened.reply) {
                Ok(reply) => {
                    observability::record_success();
                    reply
                }
                Err(err) => {
                    observability::record_error(ErrorClass::SEAL);
                    warn!("v4-compat: {}: {}", dispatched.operation, err);
                    error_reply(err.legacy_code())
                }
            },
            Err(err) => {
                observability::record_error(err.class());
                let code = err.legacy_code();
                warn!("v4-compat: {}: {} ({})", dispatched.operation, code, err);
                error_reply(code)
            }
        }
    }
}

/// Serves requests on `stream` until the peer closes it.
pub async fn run_session<S>(
    context: &GatewayContext,
    stream: S,
    source: FrameSource,
    addrs: PeerAddrs,
) -> Result<(), FrameError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    observability::record_connection_opened();
    let _closed = scopeguard::guard((), |_| observability::record_connection_closed());

    let mut frames = FrameReader::new(stream, source, context.max_frame_len());
    loop {
        let payload = match frames.read_frame().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("v4-compat {}: connection closed", addrs.client);
                return Ok(());
            }
            Err(err) => {
                observability::record_error(ErrorClass::FRAME);
                warn!("v4-compat {}: dropping connection: {}", addrs.client, err);
                return Err(err);
            }
        };

        let reply = context.handle_request(&payload, addrs).await;
        if let Err(err) = write_frame(frames.get_mut(), &reply).await {
            observability::record_error(ErrorClass::FRAME);
            warn!("v4-compat {}: reply not delivered: {}", addrs.client, err);
            return Err(err);
        }
    }
}
