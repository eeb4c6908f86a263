//! The outbound half of the agent channel.
//!
//! The coordinator is fire-and-forget towards the agent: it sends and
//! then reacts only to later inbound messages. The trait hides the real
//! transport (a websocket owned by the application shell); the channel
//! implementation backs the tests.

use std::sync::mpsc;

use anyhow::Result;

use crate::protocol::GuiMessage;

pub trait Transport {
    fn send(&self, message: GuiMessage) -> Result<()>;
}

/// In-process transport over an mpsc channel.
pub struct ChannelTransport {
    tx: mpsc::Sender<GuiMessage>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, mpsc::Receiver<GuiMessage>) {
        let (tx, rx) = mpsc::channel();
        (ChannelTransport { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, message: GuiMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| anyhow::anyhow!("agent channel closed"))
    }
}
