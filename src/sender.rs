//! Trap Sender: delivers one notification per node over UDP.
//!
//! Each send resolves the receiver, binds an ephemeral socket, and
//! transmits a single SNMPv2c trap. One attempt per node; the caller
//! decides whether the run continues.

use crate::config::TrapConfig;
use crate::error::{DeliveryError, ErrorStatus};
use crate::snmp::{encode_trap_message, Oid, Value};
use crate::translator::VarbindSet;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, error};

/// Delivers varbind sets as trap notifications. Seam for orchestrator
/// tests.
pub trait TrapDelivery {
    fn send_trap(
        &self,
        varbinds: &VarbindSet,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

pub struct TrapSender {
    config: TrapConfig,
    request_id: AtomicI32,
}

impl TrapSender {
    pub fn new(config: TrapConfig) -> Self {
        Self {
            config,
            request_id: AtomicI32::new(1),
        }
    }

    fn target(&self) -> String {
        format!("{}:{}", self.config.receiver, self.config.receiver_port)
    }

    /// Map the opaque-string varbind set onto wire varbinds, prepending
    /// the notification header pair: `sysUpTime.0` as TimeTicks and
    /// `snmpTrapOID.0` carrying the enterprise trap OID.
    ///
    /// Indexes in protocol errors are 1-based wire positions, so the
    /// first translated varbind sits at index 3.
    fn wire_varbinds(&self, varbinds: &VarbindSet) -> Result<Vec<(Oid, Value)>, DeliveryError> {
        let trap_oid: Oid =
            self.config
                .enterprise_oid
                .parse()
                .map_err(|_| DeliveryError::Protocol {
                    status: ErrorStatus::BadValue,
                    index: 2,
                })?;

        let mut wire = Vec::with_capacity(varbinds.len() + 2);
        wire.push((
            Oid::from_static(&[1, 3, 6, 1, 2, 1, 1, 3, 0]),
            Value::TimeTicks(0),
        ));
        wire.push((
            Oid::from_static(&[1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0]),
            Value::ObjectIdentifier(trap_oid),
        ));
        for (i, vb) in varbinds.iter().enumerate() {
            let oid: Oid = vb.oid.parse().map_err(|_| DeliveryError::Protocol {
                status: ErrorStatus::BadValue,
                index: (i + 3) as u32,
            })?;
            wire.push((oid, Value::OctetString(vb.value.clone().into_bytes())));
        }
        Ok(wire)
    }

    async fn transmit(&self, payload: &[u8]) -> io::Result<()> {
        let mut addrs =
            tokio::net::lookup_host((self.config.receiver.as_str(), self.config.receiver_port))
                .await?;
        let addr = addrs.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {}", self.config.receiver),
            )
        })?;

        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.send_to(payload, addr).await?;
        Ok(())
    }
}

impl TrapDelivery for TrapSender {
    async fn send_trap(&self, varbinds: &VarbindSet) -> Result<(), DeliveryError> {
        let wire = match self.wire_varbinds(varbinds) {
            Ok(wire) => wire,
            Err(e) => {
                error!("Failed to encode trap for {}: {}", self.target(), e);
                return Err(e);
            }
        };

        let request_id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let payload = encode_trap_message(&self.config.community, request_id, &wire);
        let deadline = Duration::from_millis(self.config.send_timeout_ms);

        let result = match tokio::time::timeout(deadline, self.transmit(&payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(DeliveryError::Transport {
                target: self.target(),
                source,
            }),
            Err(_) => Err(DeliveryError::Transport {
                target: self.target(),
                source: io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("trap send exceeded {:?}", deadline),
                ),
            }),
        };

        match &result {
            Ok(()) => debug!(
                "Sent trap #{} ({} bytes, {} varbinds) to {}",
                request_id,
                payload.len(),
                wire.len(),
                self.target()
            ),
            Err(e) => error!("Failed to send trap #{} to {}: {}", request_id, self.target(), e),
        }
        result
    }
}
