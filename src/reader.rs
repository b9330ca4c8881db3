//! Background reader: the sole consumer of inbound transport bytes.

use std::sync::{Arc, RwLock};

use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::listener::FrameDispatcher;
use crate::protocol::frame::FrameDecoder;
use crate::transport::TransportReader;
use crate::types::device::OperatingMode;

const READ_BUFFER_SIZE: usize = 1024;

/// Drains the transport, feeds the codec and publishes decoded frames.
///
/// Codec errors drop the offending frame only. The loop exits on EOF or a
/// fatal read error, after which the dispatcher is closed so every
/// outstanding waiter observes the shutdown.
pub(crate) async fn run_read_loop(
    mut reader: TransportReader,
    mode: Arc<RwLock<OperatingMode>>,
    dispatcher: FrameDispatcher,
) {
    let mut decoder = FrameDecoder::new(read_escaped(&mode));
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("transport reached end of stream");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!("transport read failed: {e}");
                break;
            }
        };
        tracing::trace!("received {n} bytes");

        decoder.set_escaped(read_escaped(&mode));
        dispatcher.dispatch_raw(Bytes::copy_from_slice(&buf[..n]));
        decoder.feed(&buf[..n]);

        loop {
            match decoder.decode() {
                Ok(Some(frame)) => {
                    tracing::trace!("decoded {frame}");
                    dispatcher.dispatch(frame);
                }
                Ok(None) => break,
                Err(e) => {
                    // Drop the frame, keep the stream.
                    tracing::warn!("discarding invalid frame: {e}");
                }
            }
        }
    }

    dispatcher.close();
}

fn read_escaped(mode: &Arc<RwLock<OperatingMode>>) -> bool {
    mode.read().map_or(false, |m| m.is_escaped())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::encode;
    use crate::protocol::packet::{ATCommandResponseFrame, XBeeApiFrame};
    use crate::types::atcommand::ATCommandStatus;
    use tokio::io::AsyncWriteExt;

    fn response_frame(id: u8) -> XBeeApiFrame {
        XBeeApiFrame::ATCommandResponse(ATCommandResponseFrame {
            frame_id: id,
            command: *b"NI",
            status: ATCommandStatus::Ok,
            value: Some(Bytes::from_static(b"node")),
        })
    }

    fn spawn_reader(
        mode: OperatingMode,
    ) -> (tokio::io::DuplexStream, FrameDispatcher) {
        let (far, near) = tokio::io::duplex(256);
        let dispatcher = FrameDispatcher::new();
        let mode = Arc::new(RwLock::new(mode));
        tokio::spawn(run_read_loop(
            Box::new(near),
            mode,
            dispatcher.clone(),
        ));
        (far, dispatcher)
    }

    #[tokio::test]
    async fn test_publishes_decoded_frames() {
        let (mut far, dispatcher) = spawn_reader(OperatingMode::Api);
        let mut sub = dispatcher.subscribe();

        far.write_all(&encode(&response_frame(1), false)).await.unwrap();
        assert_eq!(sub.recv().await, Some(response_frame(1)));
    }

    #[tokio::test]
    async fn test_bad_frame_dropped_stream_continues() {
        let (mut far, dispatcher) = spawn_reader(OperatingMode::Api);
        let mut sub = dispatcher.subscribe();

        // Valid header, corrupted checksum, then a good frame.
        far.write_all(&[0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x49, 0x60])
            .await
            .unwrap();
        far.write_all(&encode(&response_frame(2), false)).await.unwrap();

        assert_eq!(sub.recv().await, Some(response_frame(2)));
    }

    #[tokio::test]
    async fn test_escaped_mode_decoding() {
        let (mut far, dispatcher) = spawn_reader(OperatingMode::ApiEscape);
        let mut sub = dispatcher.subscribe();

        let frame = XBeeApiFrame::ATCommandResponse(ATCommandResponseFrame {
            frame_id: 1,
            command: *b"D0",
            status: ATCommandStatus::Ok,
            value: Some(Bytes::from_static(&[0x7E, 0x11])),
        });
        far.write_all(&encode(&frame, true)).await.unwrap();
        assert_eq!(sub.recv().await, Some(frame));
    }

    #[tokio::test]
    async fn test_eof_closes_dispatcher() {
        let (far, dispatcher) = spawn_reader(OperatingMode::Api);
        let mut sub = dispatcher.subscribe();

        drop(far);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_raw_bytes_republished() {
        let (mut far, dispatcher) = spawn_reader(OperatingMode::Api);
        let mut raw = dispatcher.subscribe_raw();

        far.write_all(b"OK\r").await.unwrap();
        assert_eq!(raw.recv().await, Some(Bytes::from_static(b"OK\r")));
    }
}
