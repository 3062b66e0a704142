//! Delivery flood task.

use bytes::BytesMut;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWrite;
use tracing::{debug, error, info};

use super::{SessionConfig, SharedSessionState, TaskOutcome};
use crate::smpp::codec::{encode_deliver_sm_into, encode_unbind};
use crate::smpp::random::{dest_digits, random_dest_addr, random_message};
use crate::smpp::{CommandId, DeliverSm, FrameHeader, HEADER_LEN};

/// Source address stamped on every generated delivery
pub const SOURCE_ADDR: &str = "353861234567";

/// What the Sender managed to do before stopping
#[derive(Debug, Clone, Default)]
pub struct SenderReport {
    /// `deliver_sm` frames fully written
    pub sent: u32,
    /// Time spent in the delivery loop
    pub elapsed: Duration,
    /// True if the loop stopped because the peer asked to unbind
    pub stopped_by_peer: bool,
    /// True if our own `unbind` went out
    pub unbind_sent: bool,
}

/// Writes `target_count` deliveries, then an `unbind`
pub struct Sender<W> {
    shared: Arc<SharedSessionState<W>>,
    target_count: u32,
    io_timeout: Option<Duration>,
    progress_interval: u32,
    rng: StdRng,
}

/// The fixed part of every generated delivery
///
/// Empty service type and times plus 12-digit addresses give a frame of
/// `57 + sm_length` bytes.
pub fn delivery_template() -> DeliverSm {
    DeliverSm {
        header: FrameHeader::new(CommandId::DeliverSm, 0),
        service_type: String::new(),
        source_ton: 0,
        source_npi: 0,
        source_addr: SOURCE_ADDR.to_string(),
        dest_ton: 0,
        dest_npi: 0,
        dest_addr: String::new(),
        esm_class: 0,
        protocol_id: 0,
        priority: 0,
        delivery_time: String::new(),
        expiry_time: String::new(),
        registered: 0,
        replace_if_present: 0,
        data_coding: 0,
        default_msg_id: 0,
        short_message: Vec::new(),
    }
}

/// Fill the per-frame fields of a delivery
pub fn next_delivery<R: Rng + ?Sized>(template: &DeliverSm, seq: u32, rng: &mut R) -> DeliverSm {
    let dest = random_dest_addr(rng, template.dest_ton, template.dest_npi);
    DeliverSm {
        header: FrameHeader::new(CommandId::DeliverSm, seq),
        dest_ton: dest[0],
        dest_npi: dest[1],
        dest_addr: dest_digits(&dest),
        short_message: random_message(rng),
        ..template.clone()
    }
}

impl<W> Sender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(
        config: &SessionConfig,
        shared: Arc<SharedSessionState<W>>,
        target_count: u32,
    ) -> Self {
        Self {
            shared,
            target_count,
            io_timeout: config.io_timeout,
            progress_interval: config.progress_interval,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed seed so generated traffic is reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub async fn run(mut self) -> TaskOutcome<SenderReport> {
        let template = delivery_template();
        let mut frame = BytesMut::with_capacity(HEADER_LEN + 208);
        let mut report = SenderReport::default();
        let mut failure = None;

        info!("Attempting to send {} deliver_sm PDUs", self.target_count);
        let start = Instant::now();

        for seq in 1..=self.target_count {
            if self.shared.is_unbinding() {
                debug!(seq, "unbind in progress, stopping delivery loop");
                break;
            }

            let pdu = next_delivery(&template, seq, &mut self.rng);
            frame.clear();
            encode_deliver_sm_into(&pdu, &mut frame);

            if let Err(e) = self.shared.write_frame(&frame, self.io_timeout).await {
                error!(seq, "write failed: {}", e);
                failure = Some(e);
                break;
            }
            report.sent = seq;

            if self.progress_interval > 0 && seq % self.progress_interval == 0 {
                info!(sent = seq, "progress");
            }
        }

        report.elapsed = start.elapsed();
        report.stopped_by_peer = self.shared.is_unbinding();
        info!(
            sent = report.sent,
            elapsed = ?report.elapsed,
            "Sent {} deliver_sm PDUs",
            report.sent
        );

        if failure.is_none() && !report.stopped_by_peer {
            let unbind = encode_unbind(report.sent.wrapping_add(1));
            match self.shared.write_frame(&unbind, self.io_timeout).await {
                Ok(()) => {
                    debug!(seq = report.sent.wrapping_add(1), "unbind sent");
                    report.unbind_sent = true;
                }
                Err(e) => error!("error sending unbind: {}", e),
            }
        }

        match failure {
            Some(e) => TaskOutcome::failed(report, e),
            None => TaskOutcome::ok(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smpp::codec::{decode_deliver_sm, decode_header, encode_deliver_sm};
    use crate::smpp::FrameReader;

    #[test]
    fn test_template_frame_length() {
        let mut rng = StdRng::seed_from_u64(3);
        let template = delivery_template();
        for seq in 1..=50 {
            let pdu = next_delivery(&template, seq, &mut rng);
            let bytes = encode_deliver_sm(&pdu);
            assert_eq!(bytes.len(), 57 + pdu.short_message.len());
            assert_eq!(pdu.dest_addr.len(), 12);
            assert_eq!(pdu.header.sequence_number, seq);
        }
    }

    #[tokio::test]
    async fn test_sender_writes_sequence_then_unbind() {
        let (local, mut peer) = tokio::io::duplex(64 * 1024);
        let shared = Arc::new(SharedSessionState::new(local));
        let config = SessionConfig::default();

        let outcome = Sender::new(&config, Arc::clone(&shared), 5)
            .with_seed(1)
            .run()
            .await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.report.sent, 5);
        assert!(outcome.report.unbind_sent);
        drop(shared);

        let mut frames = FrameReader::new(64, 1024);
        for expected in 1..=5u32 {
            let frame = frames.read_frame(&mut peer).await.unwrap();
            let pdu = decode_deliver_sm(frame).unwrap();
            assert_eq!(pdu.header.sequence_number, expected);
            assert_eq!(pdu.header.length as usize, 57 + pdu.short_message.len());
        }
        let frame = frames.read_frame(&mut peer).await.unwrap();
        let header = decode_header(frame).unwrap();
        assert_eq!(header.command(), Some(CommandId::Unbind));
        assert_eq!(header.sequence_number, 6);
    }

    #[tokio::test]
    async fn test_sender_stops_when_unbinding() {
        let (local, mut peer) = tokio::io::duplex(1024);
        let shared = Arc::new(SharedSessionState::new(local));
        shared.begin_unbind();

        let outcome = Sender::new(&SessionConfig::default(), Arc::clone(&shared), 100)
            .run()
            .await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.report.sent, 0);
        assert!(outcome.report.stopped_by_peer);
        assert!(!outcome.report.unbind_sent);

        drop(shared);
        let mut rest = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut peer, &mut rest)
            .await
            .unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_sender_reports_write_failure() {
        let (local, peer) = tokio::io::duplex(1024);
        drop(peer);
        let shared = Arc::new(SharedSessionState::new(local));

        let outcome = Sender::new(&SessionConfig::default(), shared, 10).run().await;
        assert_eq!(outcome.report.sent, 0);
        assert!(!outcome.report.unbind_sent);
        assert!(outcome.error.map(|e| e.is_disconnect()).unwrap_or(false));
    }
}
