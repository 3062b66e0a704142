use anyhow::Result;
use smpp_stress::session::{SessionConfig, SessionCoordinator, SessionEnd};
use smpp_stress::smpp::codec::{
    decode_deliver_sm, decode_header, decode_unbind, encode_deliver_sm_resp, encode_unbind,
    encode_unbind_resp,
};
use smpp_stress::{CommandId, FrameReader};
use tokio::io::{AsyncWriteExt, DuplexStream};

const PIPE_CAPACITY: usize = 64 * 1024;

/// What a scripted peer saw on its side of the pipe
#[derive(Debug, Default)]
struct PeerLog {
    deliveries: Vec<u32>,
    unbind_seq: Option<u32>,
    unbind_resp_seq: Option<u32>,
}

/// Acknowledge every delivery and answer the server's unbind, then read to EOF.
async fn acking_peer(mut peer: DuplexStream) -> Result<PeerLog> {
    let mut frames = FrameReader::new(64, 4096);
    let mut log = PeerLog::default();

    loop {
        let frame = match frames.read_frame(&mut peer).await {
            Ok(frame) => frame,
            Err(e) if e.is_disconnect() => break,
            Err(e) => return Err(e.into()),
        };
        let header = decode_header(frame)?;
        match header.command() {
            Some(CommandId::DeliverSm) => {
                let pdu = decode_deliver_sm(frame)?;
                assert_eq!(pdu.header.length as usize, 57 + pdu.short_message.len());
                log.deliveries.push(header.sequence_number);
                peer.write_all(&encode_deliver_sm_resp(header.sequence_number, 0))
                    .await?;
            }
            Some(CommandId::Unbind) => {
                let unbind = decode_unbind(frame)?;
                log.unbind_seq = Some(unbind.sequence_number);
                peer.write_all(&encode_unbind_resp(unbind.sequence_number))
                    .await?;
            }
            other => panic!("unexpected PDU from server: {:?}", other),
        }
    }

    Ok(log)
}

/// A full session: three deliveries, all acknowledged, then our unbind.
#[tokio::test]
async fn session_sends_target_then_unbinds() -> Result<()> {
    let (local, peer) = tokio::io::duplex(PIPE_CAPACITY);
    let coordinator = SessionCoordinator::new(SessionConfig::default());

    let (summary, log) = tokio::join!(coordinator.execute(local, 3), acking_peer(peer));
    let summary = summary?;
    let log = log?;

    assert_eq!(log.deliveries, vec![1, 2, 3]);
    assert_eq!(log.unbind_seq, Some(4));

    assert_eq!(summary.sent, 3);
    assert_eq!(summary.responses, 3);
    assert!(summary.unbind_sent);
    assert_eq!(summary.end, SessionEnd::UnbindAcknowledged);
    Ok(())
}

/// Expect exactly one frame back: the unbind_resp for the peer's unbind.
async fn assert_only_unbind_resp(local: DuplexStream, mut peer: DuplexStream) -> Result<()> {
    peer.write_all(&encode_unbind(77)).await?;

    let coordinator = SessionCoordinator::new(SessionConfig::default());
    let reader = async move {
        let mut frames = FrameReader::new(64, 4096);
        let mut seen = Vec::new();
        while let Ok(frame) = frames.read_frame(&mut peer).await {
            let header = decode_header(frame)?;
            seen.push((header.command(), header.sequence_number));
        }
        Ok::<_, anyhow::Error>(seen)
    };

    let (summary, seen) = tokio::join!(coordinator.execute(local, 1), reader);
    let summary = summary?;
    let seen = seen?;

    assert_eq!(seen, vec![(Some(CommandId::UnbindResp), 77)]);
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.responses, 0);
    assert!(!summary.unbind_sent);
    assert_eq!(summary.end, SessionEnd::PeerUnbind);
    Ok(())
}

/// The peer asks to unbind before anything is sent.
#[tokio::test(flavor = "current_thread")]
async fn session_honours_peer_unbind_first() -> Result<()> {
    let (local, peer) = tokio::io::duplex(PIPE_CAPACITY);
    assert_only_unbind_resp(local, peer).await
}

/// Same as above on a work-stealing runtime, repeated: the Sender must never
/// start before the buffered unbind has been handled.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn session_honours_peer_unbind_first_on_worker_threads() -> Result<()> {
    for _ in 0..200 {
        let (local, peer) = tokio::io::duplex(PIPE_CAPACITY);
        assert_only_unbind_resp(local, peer).await?;
    }
    Ok(())
}

/// The peer unbinds in the middle of a flood.
///
/// The unbind response is written by the Receiver while the Sender is still
/// writing deliveries; every frame the peer reads must still be whole.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn session_peer_unbind_mid_flood_keeps_frames_whole() -> Result<()> {
    const ACKED: u32 = 500;

    let (local, mut peer) = tokio::io::duplex(PIPE_CAPACITY);
    let coordinator = SessionCoordinator::new(SessionConfig::default());

    let scripted = async move {
        let mut frames = FrameReader::new(64, 4096);
        let mut log = PeerLog::default();

        loop {
            let frame = match frames.read_frame(&mut peer).await {
                Ok(frame) => frame,
                Err(e) if e.is_disconnect() => break,
                Err(e) => return Err(anyhow::Error::from(e)),
            };
            let header = decode_header(frame)?;
            match header.command() {
                Some(CommandId::DeliverSm) => {
                    decode_deliver_sm(frame)?;
                    log.deliveries.push(header.sequence_number);
                    let count = log.deliveries.len() as u32;
                    if count <= ACKED {
                        peer.write_all(&encode_deliver_sm_resp(header.sequence_number, 0))
                            .await?;
                    }
                    if count == ACKED {
                        peer.write_all(&encode_unbind(9_999)).await?;
                    }
                }
                Some(CommandId::UnbindResp) => {
                    assert!(log.unbind_resp_seq.is_none(), "second unbind_resp");
                    log.unbind_resp_seq = Some(header.sequence_number);
                }
                Some(CommandId::Unbind) => log.unbind_seq = Some(header.sequence_number),
                other => panic!("unexpected PDU from server: {:?}", other),
            }
        }
        Ok::<_, anyhow::Error>(log)
    };

    let (summary, log) = tokio::join!(coordinator.execute(local, 100_000), scripted);
    let summary = summary?;
    let log = log?;

    assert_eq!(log.unbind_resp_seq, Some(9_999));
    assert_eq!(log.unbind_seq, None);

    let expected: Vec<u32> = (1..=summary.sent).collect();
    assert_eq!(log.deliveries, expected);
    assert!(summary.sent >= ACKED);
    assert!(summary.sent < 100_000);

    assert_eq!(summary.responses, ACKED);
    assert!(!summary.unbind_sent);
    assert_eq!(summary.end, SessionEnd::PeerUnbind);
    Ok(())
}

/// The peer vanishes mid-flood: the session fails with an I/O error.
#[tokio::test]
async fn session_reports_lost_connection() -> Result<()> {
    let (local, mut peer) = tokio::io::duplex(PIPE_CAPACITY);
    let coordinator = SessionCoordinator::new(SessionConfig::default());

    let vanishing = async move {
        let mut frames = FrameReader::new(64, 4096);
        for _ in 0..10 {
            frames.read_frame(&mut peer).await?;
        }
        drop(peer);
        Ok::<_, anyhow::Error>(())
    };

    let (summary, peer_result) = tokio::join!(coordinator.execute(local, 100_000), vanishing);
    peer_result?;

    let err = summary.expect_err("flood cannot complete without a peer");
    assert!(err.is_disconnect(), "unexpected error: {}", err);
    Ok(())
}
