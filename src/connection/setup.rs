//! SETUP validation (server side).
//!
//! The first frame on a server connection must be a SETUP. While it is
//! being validated, every other inbound frame is buffered by the
//! connection and replayed in order once the handshake is accepted, so no
//! request frame is ever processed before setup completes.

use crate::frame::{error_code, SetupBody, Version};

/// Application-level veto over an otherwise valid SETUP.
///
/// Sees the negotiated MIME types and the setup payload; returning an
/// error string rejects the connection with `REJECTED_SETUP`.
pub type SetupAcceptor = Box<dyn FnMut(&SetupBody) -> Result<(), String> + Send>;

/// Server-side setup policy.
pub struct ServerSetupOptions {
    /// Highest protocol version accepted (by major version).
    pub max_version: Version,
    /// Optional application acceptor.
    pub acceptor: Option<SetupAcceptor>,
}

impl Default for ServerSetupOptions {
    fn default() -> Self {
        Self {
            max_version: Version::CURRENT,
            acceptor: None,
        }
    }
}

impl std::fmt::Debug for ServerSetupOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSetupOptions")
            .field("max_version", &self.max_version)
            .field("acceptor", &self.acceptor.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Why a SETUP was refused; `code` goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRejection {
    pub code: u32,
    pub message: String,
}

impl SetupRejection {
    fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Validate a (fully assembled) SETUP frame against the server policy.
pub fn validate_setup(
    setup: &SetupBody,
    options: &mut ServerSetupOptions,
) -> Result<(), SetupRejection> {
    if setup.version.major > options.max_version.major {
        return Err(SetupRejection::new(
            error_code::UNSUPPORTED_SETUP,
            format!(
                "protocol version {} exceeds supported maximum {}",
                setup.version, options.max_version
            ),
        ));
    }

    if setup.resume_token.is_some() {
        return Err(SetupRejection::new(
            error_code::UNSUPPORTED_SETUP,
            "resumption is not supported",
        ));
    }

    if setup.lease {
        return Err(SetupRejection::new(
            error_code::UNSUPPORTED_SETUP,
            "lease is not supported",
        ));
    }

    if setup.keepalive_interval_ms <= 0 {
        return Err(SetupRejection::new(
            error_code::INVALID_SETUP,
            format!(
                "keepalive interval must be positive, got {}",
                setup.keepalive_interval_ms
            ),
        ));
    }

    if setup.max_lifetime_ms <= 0 {
        return Err(SetupRejection::new(
            error_code::INVALID_SETUP,
            format!(
                "max lifetime must be positive, got {}",
                setup.max_lifetime_ms
            ),
        ));
    }

    if let Some(acceptor) = options.acceptor.as_mut() {
        acceptor(setup)
            .map_err(|message| SetupRejection::new(error_code::REJECTED_SETUP, message))?;
    }

    Ok(())
}
