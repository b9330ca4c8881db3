//! Frame listeners: fan-out of decoded frames to subscribers.
//!
//! Two subscriber classes exist: global subscribers see every decoded
//! frame; keyed subscribers see only frames carrying their frame ID. Both
//! receive frames through a bounded broadcast handoff, so a slow consumer
//! never blocks the reader; it instead loses the oldest frames and is told
//! how many.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{broadcast, watch};

use crate::protocol::packet::XBeeApiFrame;

/// Buffered frames per subscriber before drop-oldest kicks in.
const FRAME_CAPACITY: usize = 64;
/// Buffered chunks on the raw byte channel.
const RAW_CAPACITY: usize = 16;

struct DispatcherInner {
    global: broadcast::Sender<XBeeApiFrame>,
    keyed: Mutex<HashMap<u8, broadcast::Sender<XBeeApiFrame>>>,
    raw: broadcast::Sender<Bytes>,
    shutdown: watch::Sender<bool>,
}

/// Routes decoded frames to subscribers.
#[derive(Clone)]
pub(crate) struct FrameDispatcher {
    inner: Arc<DispatcherInner>,
}

impl FrameDispatcher {
    pub(crate) fn new() -> Self {
        let (global, _) = broadcast::channel(FRAME_CAPACITY);
        let (raw, _) = broadcast::channel(RAW_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(DispatcherInner {
                global,
                keyed: Mutex::new(HashMap::new()),
                raw,
                shutdown,
            }),
        }
    }

    /// Delivers a decoded frame to the matching keyed subscriber (if any)
    /// and to every global subscriber. Never blocks.
    pub(crate) fn dispatch(&self, frame: XBeeApiFrame) {
        if let Some(id) = frame.frame_id() {
            let keyed = self.inner.keyed.lock().expect("listener registry poisoned");
            if let Some(tx) = keyed.get(&id) {
                let _ = tx.send(frame.clone());
            }
        }
        // No global subscribers is fine.
        let _ = self.inner.global.send(frame);
    }

    /// Republishes a raw received chunk for mode probing.
    pub(crate) fn dispatch_raw(&self, data: Bytes) {
        let _ = self.inner.raw.send(data);
    }

    /// Subscribes to every decoded frame.
    pub(crate) fn subscribe(&self) -> FrameSubscription {
        FrameSubscription {
            rx: self.inner.global.subscribe(),
            shutdown: self.inner.shutdown.subscribe(),
            key: None,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Subscribes to frames carrying the given frame ID.
    pub(crate) fn subscribe_frame_id(&self, id: u8) -> FrameSubscription {
        let rx = {
            let mut keyed = self.inner.keyed.lock().expect("listener registry poisoned");
            keyed
                .entry(id)
                .or_insert_with(|| broadcast::channel(FRAME_CAPACITY).0)
                .subscribe()
        };
        FrameSubscription {
            rx,
            shutdown: self.inner.shutdown.subscribe(),
            key: Some(id),
            inner: Arc::clone(&self.inner),
        }
    }

    /// Subscribes to raw received bytes.
    pub(crate) fn subscribe_raw(&self) -> RawSubscription {
        RawSubscription {
            rx: self.inner.raw.subscribe(),
        }
    }

    /// Marks the registry closed. Every pending and future `recv` drains
    /// what is buffered and then returns `None`.
    pub(crate) fn close(&self) {
        let _ = self.inner.shutdown.send(true);
        self.inner
            .keyed
            .lock()
            .expect("listener registry poisoned")
            .clear();
    }

    /// Clears the shutdown mark so the registry serves a reopened
    /// transport. Subscriptions taken before the close stay ended.
    pub(crate) fn reopen(&self) {
        let _ = self.inner.shutdown.send(false);
    }
}

/// A subscription handle; frames are pulled with [`FrameSubscription::recv`].
pub struct FrameSubscription {
    rx: broadcast::Receiver<XBeeApiFrame>,
    shutdown: watch::Receiver<bool>,
    key: Option<u8>,
    inner: Arc<DispatcherInner>,
}

impl FrameSubscription {
    /// Receives the next frame.
    ///
    /// Returns `None` once the registry shut down (transport closed) and
    /// nothing more is buffered. A lagged subscriber loses the oldest
    /// frames with a warning and keeps going.
    pub async fn recv(&mut self) -> Option<XBeeApiFrame> {
        loop {
            if *self.shutdown.borrow() {
                // Closed: hand out what is buffered, then end.
                loop {
                    match self.rx.try_recv() {
                        Ok(frame) => return Some(frame),
                        Err(broadcast::error::TryRecvError::Lagged(n)) => {
                            tracing::warn!("listener lagged, dropped {n} oldest frames");
                        }
                        Err(_) => return None,
                    }
                }
            }
            tokio::select! {
                biased;
                result = self.rx.recv() => match result {
                    Ok(frame) => return Some(frame),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("listener lagged, dropped {n} oldest frames");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                _ = self.shutdown.changed() => {}
            }
        }
    }
}

impl Drop for FrameSubscription {
    fn drop(&mut self) {
        let Some(key) = self.key else { return };
        let mut keyed = match self.inner.keyed.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        // Last subscriber for this key: retire the channel.
        if keyed
            .get(&key)
            .is_some_and(|tx| tx.receiver_count() <= 1)
        {
            keyed.remove(&key);
        }
    }
}

/// A subscription to raw received byte chunks.
pub struct RawSubscription {
    rx: broadcast::Receiver<Bytes>,
}

impl RawSubscription {
    /// Receives the next chunk, skipping over any lag.
    pub async fn recv(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await {
                Ok(data) => return Some(data),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::{ATCommandFrame, ModemStatusFrame, ModemStatus};

    fn at_frame(id: u8) -> XBeeApiFrame {
        XBeeApiFrame::ATCommand(ATCommandFrame {
            frame_id: id,
            command: *b"NI",
            parameter: None,
        })
    }

    #[tokio::test]
    async fn test_global_sees_every_frame() {
        let dispatcher = FrameDispatcher::new();
        let mut sub = dispatcher.subscribe();

        dispatcher.dispatch(at_frame(1));
        dispatcher.dispatch(XBeeApiFrame::ModemStatus(ModemStatusFrame {
            status: ModemStatus::JoinedNetwork,
        }));

        assert_eq!(sub.recv().await, Some(at_frame(1)));
        assert!(matches!(
            sub.recv().await,
            Some(XBeeApiFrame::ModemStatus(_))
        ));
    }

    #[tokio::test]
    async fn test_keyed_sees_only_its_id() {
        let dispatcher = FrameDispatcher::new();
        let mut sub = dispatcher.subscribe_frame_id(7);

        dispatcher.dispatch(at_frame(3));
        dispatcher.dispatch(at_frame(7));

        assert_eq!(sub.recv().await, Some(at_frame(7)));
    }

    #[tokio::test]
    async fn test_unkeyed_frames_do_not_reach_keyed_subscribers() {
        let dispatcher = FrameDispatcher::new();
        let mut sub = dispatcher.subscribe_frame_id(1);

        dispatcher.dispatch(XBeeApiFrame::ModemStatus(ModemStatusFrame {
            status: ModemStatus::HardwareReset,
        }));
        dispatcher.dispatch(at_frame(1));

        assert_eq!(sub.recv().await, Some(at_frame(1)));
    }

    #[tokio::test]
    async fn test_keyed_entry_retired_on_drop() {
        let dispatcher = FrameDispatcher::new();
        let sub = dispatcher.subscribe_frame_id(9);
        assert!(dispatcher.inner.keyed.lock().unwrap().contains_key(&9));
        drop(sub);
        assert!(!dispatcher.inner.keyed.lock().unwrap().contains_key(&9));
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions_after_drain() {
        let dispatcher = FrameDispatcher::new();
        let mut sub = dispatcher.subscribe();

        dispatcher.dispatch(at_frame(2));
        dispatcher.close();

        // The buffered frame is still delivered, then the stream ends.
        assert_eq!(sub.recv().await, Some(at_frame(2)));
        assert_eq!(sub.recv().await, None);

        let mut late = dispatcher.subscribe();
        assert_eq!(late.recv().await, None);
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let dispatcher = FrameDispatcher::new();
        let mut sub = dispatcher.subscribe();

        for i in 0..(FRAME_CAPACITY + 3) {
            dispatcher.dispatch(at_frame((i % 250) as u8 + 1));
        }
        // The three oldest frames were dropped; delivery resumes there.
        assert_eq!(sub.recv().await, Some(at_frame(4)));
    }

    #[tokio::test]
    async fn test_raw_channel() {
        let dispatcher = FrameDispatcher::new();
        let mut sub = dispatcher.subscribe_raw();
        dispatcher.dispatch_raw(Bytes::from_static(b"OK\r"));
        assert_eq!(sub.recv().await, Some(Bytes::from_static(b"OK\r")));
    }
}
