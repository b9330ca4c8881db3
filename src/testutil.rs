//! Test doubles shared by the async test suites.
//!
//! [`MockTransport`] is an in-memory transport over a duplex pipe; the far
//! end of the pipe plays the radio module.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, WriteHalf};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::protocol::frame::{encode, FrameDecoder};
use crate::protocol::packet::{
    ATCommandResponseFrame, RemoteATCommandResponseFrame, XBeeApiFrame,
};
use crate::transport::{Transport, TransportReader};
use crate::types::address::XBee16BitAddress;
use crate::types::atcommand::ATCommandStatus;

pub(crate) struct MockTransport {
    reader: Option<TransportReader>,
    writer: Option<WriteHalf<DuplexStream>>,
    open: bool,
}

/// Builds a transport plus the module-side end of the pipe.
pub(crate) fn mock_transport() -> (MockTransport, DuplexStream) {
    let (near, far) = tokio::io::duplex(4096);
    let (reader, writer) = tokio::io::split(near);
    (
        MockTransport {
            reader: Some(Box::new(reader)),
            writer: Some(writer),
            open: true,
        },
        far,
    )
}

impl Transport for MockTransport {
    fn open(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.open = true;
            Ok(())
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.open = false;
            self.writer = None;
            Ok(())
        })
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let writer = self.writer.as_mut().ok_or(Error::InterfaceNotOpen)?;
            writer.write_all(&data).await.map_err(Error::Io)?;
            Ok(())
        })
    }

    fn take_reader(&mut self) -> Option<TransportReader> {
        self.reader.take()
    }
}

/// Maps each decoded request to the frames the module answers with.
pub(crate) type ModuleResponder = Box<dyn FnMut(&XBeeApiFrame) -> Vec<XBeeApiFrame> + Send>;

/// Runs a scripted module on the far end of the pipe.
pub(crate) fn spawn_module(far: DuplexStream, mut responder: ModuleResponder) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (mut rd, mut wr) = tokio::io::split(far);
        let mut decoder = FrameDecoder::new(false);
        let mut buf = [0u8; 1024];
        loop {
            let n = match rd.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            decoder.feed(&buf[..n]);
            loop {
                match decoder.decode() {
                    Ok(Some(frame)) => {
                        for response in responder(&frame) {
                            if wr.write_all(&encode(&response, false)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {}
                }
            }
        }
    })
}

/// A responder that answers AT and remote-AT reads from a value table with
/// status OK. Writes and executes get an empty OK.
pub(crate) fn at_responder(values: HashMap<&'static str, Bytes>) -> ModuleResponder {
    Box::new(move |frame| {
        let (frame_id, command, has_parameter, remote) = match frame {
            XBeeApiFrame::ATCommand(at) => (at.frame_id, at.command, at.parameter.is_some(), None),
            XBeeApiFrame::RemoteATCommand(at) => {
                (at.frame_id, at.command, at.parameter.is_some(), Some(at.dest64))
            }
            _ => return Vec::new(),
        };
        let name = std::str::from_utf8(&command).unwrap_or("??");
        let value = if has_parameter {
            None
        } else {
            values.get(name).cloned()
        };
        let response = match remote {
            None => XBeeApiFrame::ATCommandResponse(ATCommandResponseFrame {
                frame_id,
                command,
                status: ATCommandStatus::Ok,
                value,
            }),
            Some(addr64) => XBeeApiFrame::RemoteATCommandResponse(RemoteATCommandResponseFrame {
                frame_id,
                addr64,
                addr16: XBee16BitAddress::new(0x12, 0x34),
                command,
                status: ATCommandStatus::Ok,
                value,
            }),
        };
        vec![response]
    })
}
