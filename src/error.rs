//! Error types for the trap pipeline.
//!
//! Every failure class the run can abort on is a named variant here;
//! nothing is recovered locally. The binary wraps these in `anyhow` at
//! the top level.

/// SNMP error-status codes (RFC 3416 subset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    /// Unknown/future error status code.
    Unknown(i32),
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Fetch-phase failures. All of them are fatal to the run.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The API rejected the configured credentials (HTTP 401).
    #[error("invalid API credentials (401)")]
    Auth,

    /// Any other non-success HTTP status.
    #[error("unexpected API response: {status}")]
    UnexpectedResponse { status: u16 },

    /// The decoded body is not a JSON array of node records.
    #[error("malformed API payload: {detail}")]
    MalformedPayload { detail: String },

    /// Transport-level HTTP failure (connect, timeout, TLS, body read).
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A node record whose identity field cannot be coerced to an integer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TranslateError {
    #[error("node record is missing NodeID")]
    MissingNodeId,

    #[error("NodeID {value:?} is not coercible to an integer")]
    InvalidNodeId { value: String },
}

/// Send-phase failures. One attempt per node, no retry.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DeliveryError {
    /// Transport/network-level failure: target resolution, socket
    /// setup, the UDP send itself, or the send deadline expiring.
    #[error("transport error sending trap to {target}: {source}")]
    Transport {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero protocol error status. Traps are one-way, so this is
    /// raised when a varbind name OID cannot be put on the wire; `index`
    /// is the 1-based position of the offending varbind.
    #[error("SNMP protocol error: {status} at varbind index {index}")]
    Protocol { status: ErrorStatus, index: u32 },
}

/// Run-level error: whichever classified failure aborted the run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("node at position {position}: {source}")]
    Translate {
        /// 0-based position of the record in fetch order.
        position: usize,
        #[source]
        source: TranslateError,
    },

    #[error("node {node_id}: {source}")]
    Delivery {
        node_id: i64,
        #[source]
        source: DeliveryError,
    },
}
