//! # Stress Client
//!
//! The other end of a stress session. Binds as a receiver, acknowledges every
//! `deliver_sm` with a `deliver_sm_resp` echoing its sequence number, and
//! completes whichever side of the unbind handshake comes first.
//!
//! The client can also start the unbind itself after a fixed number of
//! deliveries, which exercises the server's peer-unbind path.

use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::session::{with_deadline, SessionEnd};
use crate::smpp::codec::{
    decode_bind_receiver_resp, decode_header, encode_bind_receiver, encode_deliver_sm_resp,
    encode_unbind, encode_unbind_resp,
};
use crate::smpp::{BindReceiver, CommandId, FrameHeader, FrameReader};

/// Client-side settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub interface_version: u8,
    pub addr_ton: u8,
    pub addr_npi: u8,
    pub address_range: String,

    /// Send our own `unbind` after this many deliveries
    pub unbind_after: Option<u32>,

    /// Deadline for each frame read or write; `None` blocks indefinitely
    pub io_timeout: Option<Duration>,

    pub max_frame_len: usize,

    /// Log progress every this many deliveries; 0 disables it
    pub progress_interval: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            system_id: "stress_client".to_string(),
            password: String::new(),
            system_type: String::new(),
            interface_version: 0x34,
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
            unbind_after: None,
            io_timeout: None,
            max_frame_len: crate::defaults::MAX_FRAME_LEN,
            progress_interval: crate::defaults::CLIENT_PROGRESS_INTERVAL,
        }
    }
}

/// What the client saw during one session
#[derive(Debug, Clone)]
pub struct ClientReport {
    /// `deliver_sm` frames received and acknowledged
    pub delivered: u32,
    /// Time from bind response to session end
    pub elapsed: Duration,
    pub end: SessionEnd,
    /// Whether we sent our own `unbind`
    pub unbind_sent: bool,
    /// System id the server returned in `bind_receiver_resp`
    pub server_system_id: String,
}

/// Acknowledging receiver for a stress session
pub struct StressClient {
    config: ClientConfig,
}

impl StressClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Bind over `stream`, then acknowledge deliveries until the session ends
    ///
    /// A closed connection after a successful bind ends the session normally
    /// with [`SessionEnd::ConnectionLost`]. A rejected or malformed bind
    /// response is an error.
    pub async fn run<S>(&self, mut stream: S) -> Result<ClientReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let timeout = self.config.io_timeout;
        let max_frame_len = self.config.max_frame_len;
        let mut frames = FrameReader::new(crate::defaults::BIND_BUFFER_LEN, max_frame_len);
        let mut next_seq = 1u32;

        let bind = self.bind_request(next_seq);
        next_seq += 1;
        write_frame(&mut stream, &encode_bind_receiver(&bind), timeout).await?;

        let frame = with_deadline(
            timeout,
            "waiting for bind_receiver_resp",
            frames.read_frame(&mut stream),
        )
        .await?;
        let resp = decode_bind_receiver_resp(frame)?;
        if resp.header.status != 0 {
            return Err(SessionError::BindRejected(resp.header.status));
        }
        let server_system_id = resp.system_id;
        info!(server = %server_system_id, "Bound as receiver");

        let start = Instant::now();
        let mut delivered = 0u32;
        let mut unbind_sent = false;

        let end = loop {
            let read = frames.read_frame(&mut stream);
            let header = match with_deadline(timeout, "reading a frame", read).await {
                Ok(frame) => decode_header(frame)?,
                Err(e) if e.is_disconnect() => {
                    debug!("Connection closed: {}", e);
                    break SessionEnd::ConnectionLost;
                }
                Err(e) => return Err(e),
            };

            match header.command() {
                Some(CommandId::DeliverSm) => {
                    delivered += 1;
                    let ack = encode_deliver_sm_resp(header.sequence_number, 0);
                    if let Err(e) = write_frame(&mut stream, &ack, timeout).await {
                        if e.is_disconnect() {
                            debug!("Connection closed while acknowledging: {}", e);
                            break SessionEnd::ConnectionLost;
                        }
                        return Err(e);
                    }

                    let interval = self.config.progress_interval;
                    if interval > 0 && delivered % interval == 0 {
                        info!(delivered, "progress");
                    }

                    if !unbind_sent && self.config.unbind_after == Some(delivered) {
                        info!(delivered, "Requesting unbind");
                        write_frame(&mut stream, &encode_unbind(next_seq), timeout).await?;
                        unbind_sent = true;
                    }
                }
                Some(CommandId::Unbind) => {
                    info!("Unbind request received. Sending response.");
                    let resp = encode_unbind_resp(header.sequence_number);
                    write_frame(&mut stream, &resp, timeout).await?;
                    break SessionEnd::PeerUnbind;
                }
                Some(CommandId::UnbindResp) => {
                    info!("Unbind response received.");
                    break SessionEnd::UnbindAcknowledged;
                }
                _ => {
                    warn!(
                        cmd = format_args!("{:#x}", header.command_id),
                        seq = header.sequence_number,
                        "unexpected PDU received"
                    );
                }
            }
        };

        let elapsed = start.elapsed();
        info!(delivered, elapsed = ?elapsed, "Session finished");

        Ok(ClientReport {
            delivered,
            elapsed,
            end,
            unbind_sent,
            server_system_id,
        })
    }

    fn bind_request(&self, seq: u32) -> BindReceiver {
        BindReceiver {
            header: FrameHeader::new(CommandId::BindReceiver, seq),
            system_id: self.config.system_id.clone(),
            password: self.config.password.clone(),
            system_type: self.config.system_type.clone(),
            interface_version: self.config.interface_version,
            addr_ton: self.config.addr_ton,
            addr_npi: self.config.addr_npi,
            address_range: self.config.address_range.clone(),
        }
    }
}

async fn write_frame<S>(stream: &mut S, frame: &[u8], timeout: Option<Duration>) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    with_deadline(timeout, "writing a frame", async {
        stream.write_all(frame).await?;
        stream.flush().await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::sender::{delivery_template, next_delivery};
    use crate::smpp::codec::{
        decode_bind_receiver, decode_unbind, decode_unbind_resp, encode_bind_receiver_resp,
        encode_deliver_sm,
    };
    use crate::smpp::BindReceiverResp;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::io::DuplexStream;

    async fn accept(
        peer: &mut DuplexStream,
        frames: &mut FrameReader,
        status: u32,
    ) -> BindReceiver {
        let bind = decode_bind_receiver(frames.read_frame(peer).await.unwrap()).unwrap();
        let resp = BindReceiverResp {
            header: FrameHeader {
                status,
                ..FrameHeader::new(CommandId::BindReceiverResp, bind.header.sequence_number)
            },
            system_id: "recv_stresser".to_string(),
        };
        peer.write_all(&encode_bind_receiver_resp(&resp)).await.unwrap();
        bind
    }

    async fn deliver(peer: &mut DuplexStream, rng: &mut StdRng, seq: u32) {
        let pdu = next_delivery(&delivery_template(), seq, rng);
        peer.write_all(&encode_deliver_sm(&pdu)).await.unwrap();
    }

    fn read_ack_seq(frame: &[u8]) -> u32 {
        let header = decode_header(frame).unwrap();
        assert_eq!(header.command(), Some(CommandId::DeliverSmResp));
        assert_eq!(header.length, 17);
        header.sequence_number
    }

    #[tokio::test]
    async fn test_client_acks_deliveries_and_answers_unbind() {
        let (local, mut peer) = tokio::io::duplex(64 * 1024);
        let client = StressClient::new(ClientConfig::default());

        let server = async move {
            let mut frames = FrameReader::new(64, 4096);
            let mut rng = StdRng::seed_from_u64(9);
            let bind = accept(&mut peer, &mut frames, 0).await;
            assert_eq!(bind.system_id, "stress_client");
            assert_eq!(bind.interface_version, 0x34);
            assert_eq!(bind.header.sequence_number, 1);

            for seq in 1..=3 {
                deliver(&mut peer, &mut rng, seq).await;
            }
            peer.write_all(&encode_unbind(4)).await.unwrap();

            for expected in 1..=3 {
                let frame = frames.read_frame(&mut peer).await.unwrap();
                assert_eq!(read_ack_seq(frame), expected);
            }
            let resp = decode_unbind_resp(frames.read_frame(&mut peer).await.unwrap()).unwrap();
            assert_eq!(resp.sequence_number, 4);
        };

        let (report, ()) = tokio::join!(client.run(local), server);
        let report = report.unwrap();
        assert_eq!(report.delivered, 3);
        assert_eq!(report.end, SessionEnd::PeerUnbind);
        assert_eq!(report.server_system_id, "recv_stresser");
    }

    #[tokio::test]
    async fn test_client_initiates_unbind() {
        let (local, mut peer) = tokio::io::duplex(64 * 1024);
        let client = StressClient::new(ClientConfig {
            unbind_after: Some(2),
            ..Default::default()
        });

        let server = async move {
            let mut frames = FrameReader::new(64, 4096);
            let mut rng = StdRng::seed_from_u64(10);
            accept(&mut peer, &mut frames, 0).await;

            deliver(&mut peer, &mut rng, 1).await;
            deliver(&mut peer, &mut rng, 2).await;
            assert_eq!(read_ack_seq(frames.read_frame(&mut peer).await.unwrap()), 1);
            assert_eq!(read_ack_seq(frames.read_frame(&mut peer).await.unwrap()), 2);

            let unbind = decode_unbind(frames.read_frame(&mut peer).await.unwrap()).unwrap();
            assert_eq!(unbind.sequence_number, 2);

            // a delivery already in flight is still acknowledged
            deliver(&mut peer, &mut rng, 3).await;
            assert_eq!(read_ack_seq(frames.read_frame(&mut peer).await.unwrap()), 3);
            peer.write_all(&encode_unbind_resp(unbind.sequence_number))
                .await
                .unwrap();
        };

        let (report, ()) = tokio::join!(client.run(local), server);
        let report = report.unwrap();
        assert_eq!(report.delivered, 3);
        assert_eq!(report.end, SessionEnd::UnbindAcknowledged);
        assert!(report.unbind_sent);
    }

    #[tokio::test]
    async fn test_client_rejected_bind() {
        let (local, mut peer) = tokio::io::duplex(4096);
        let client = StressClient::new(ClientConfig::default());

        let server = async move {
            let mut frames = FrameReader::new(64, 4096);
            let bind = decode_bind_receiver(frames.read_frame(&mut peer).await.unwrap()).unwrap();
            // header-only rejection, status ESME_RBINDFAIL
            let mut reject = encode_unbind_resp(bind.header.sequence_number).to_vec();
            reject[4..8].copy_from_slice(&CommandId::BindReceiverResp.as_u32().to_be_bytes());
            reject[8..12].copy_from_slice(&0x0Du32.to_be_bytes());
            peer.write_all(&reject).await.unwrap();
            peer
        };

        let (result, _peer) = tokio::join!(client.run(local), server);
        assert!(matches!(result, Err(SessionError::BindRejected(0x0D))));
    }

    #[tokio::test]
    async fn test_client_treats_eof_as_end() {
        let (local, mut peer) = tokio::io::duplex(4096);
        let client = StressClient::new(ClientConfig::default());

        let server = async move {
            let mut frames = FrameReader::new(64, 4096);
            let mut rng = StdRng::seed_from_u64(11);
            accept(&mut peer, &mut frames, 0).await;
            deliver(&mut peer, &mut rng, 1).await;
            assert_eq!(read_ack_seq(frames.read_frame(&mut peer).await.unwrap()), 1);
        };

        let (report, ()) = tokio::join!(client.run(local), server);
        let report = report.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.end, SessionEnd::ConnectionLost);
    }
}
