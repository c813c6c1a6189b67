//! A scripted [`Transport`] for exercising the session and the layers above
//! it without a radio. Each expected command is queued up front together
//! with the reply the mock should produce for it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::frame::{FUNC_READ_HOLDING, compute_crc};
use crate::transport::Transport;

/// Build a well-formed read response carrying the given register words.
pub fn read_reply(words: &[u16]) -> Vec<u8> {
    let mut reply = vec![0x01, FUNC_READ_HOLDING, (words.len() * 2) as u8];
    for word in words {
        reply.extend_from_slice(&word.to_be_bytes());
    }
    let crc = compute_crc(&reply);
    reply.extend_from_slice(&crc.to_le_bytes());
    reply
}

enum Reply {
    /// Send these fragments, in order, as separate notifications.
    Fragments(Vec<Bytes>),
    /// Send the written frame straight back, like a write echo.
    Echo,
    /// Send nothing; the caller is expected to time out.
    Silence,
    /// Close the notification channel, simulating a link drop.
    Drop,
}

#[derive(Default)]
struct Shared {
    written: Vec<Vec<u8>>,
    script: VecDeque<Reply>,
    connects: usize,
    fail_connect: bool,
    fail_write: bool,
    write_delay: Option<std::time::Duration>,
    tx: Option<mpsc::Sender<Bytes>>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    shared: Arc<Mutex<Shared>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_fragments(&self, fragments: &[&[u8]]) {
        let fragments = fragments
            .iter()
            .map(|f| Bytes::copy_from_slice(f))
            .collect();
        self.push(Reply::Fragments(fragments));
    }

    pub fn expect_response(&self, response: &[u8]) {
        self.expect_fragments(&[response]);
    }

    /// Expect a read command and reply with the given register words.
    pub fn expect_read_reply(&self, words: &[u16]) {
        self.expect_response(&read_reply(words));
    }

    pub fn expect_echo(&self) {
        self.push(Reply::Echo);
    }

    pub fn expect_silence(&self) {
        self.push(Reply::Silence);
    }

    pub fn expect_drop(&self) {
        self.push(Reply::Drop);
    }

    /// Push a notification without waiting for a command, as a late reply
    /// to an abandoned command would arrive.
    pub fn inject(&self, fragment: &[u8]) {
        let tx = self
            .shared
            .lock()
            .unwrap()
            .tx
            .clone()
            .expect("inject requires a connected transport");
        tx.try_send(Bytes::copy_from_slice(fragment)).unwrap();
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared.lock().unwrap().written.clone()
    }

    pub fn connects(&self) -> usize {
        self.shared.lock().unwrap().connects
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.shared.lock().unwrap().fail_connect = fail;
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.shared.lock().unwrap().fail_write = fail;
    }

    /// Make each write stall for `delay` first, like a congested link.
    pub fn set_write_delay(&self, delay: std::time::Duration) {
        self.shared.lock().unwrap().write_delay = Some(delay);
    }

    fn push(&self, reply: Reply) {
        self.shared.lock().unwrap().script.push_back(reply);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<mpsc::Receiver<Bytes>, TransportError> {
        let mut shared = self.shared.lock().unwrap();
        if shared.fail_connect {
            return Err(TransportError::ConnectFailed("scripted failure".into()));
        }
        shared.connects += 1;
        let (tx, rx) = mpsc::channel(32);
        shared.tx = Some(tx);
        Ok(rx)
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let delay = self.shared.lock().unwrap().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let (tx, reply) = {
            let mut shared = self.shared.lock().unwrap();
            if shared.fail_write {
                return Err(TransportError::WriteFailed("scripted failure".into()));
            }
            shared.written.push(frame.to_vec());
            let reply = shared
                .script
                .pop_front()
                .expect("command written past the end of the script");
            (shared.tx.clone(), reply)
        };
        let tx = tx.ok_or(TransportError::Disconnected)?;
        match reply {
            Reply::Fragments(fragments) => {
                for fragment in fragments {
                    tx.send(fragment).await.ok();
                }
            }
            Reply::Echo => {
                tx.send(Bytes::copy_from_slice(frame)).await.ok();
            }
            Reply::Silence => {}
            Reply::Drop => {
                self.shared.lock().unwrap().tx = None;
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.shared.lock().unwrap().tx = None;
        Ok(())
    }
}
