//! Native-messaging bridge between the browser extension and the coordinator.
//!
//! The extension's background script forwards every `chrome.runtime` message
//! and every `chrome.tts` event to this process, and performs the engine
//! operations and deliveries the coordinator asks for.

pub mod framing;

use crate::config::{AppConfig, Framing};
use crate::engine::{SpeechEngine, UtteranceRequest};
use crate::error::{CoordinatorError, DeliveryError, EngineError};
use crate::messenger::Messenger;
use crate::protocol::{Command, EngineEvent, Notification, Reply, TabId, Target};
use crate::runtime::spawn_coordinator;
use framing::{FrameError, read_frame, write_frame};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use ts_rs::TS;

/// Messages from the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum HostInbound {
    Request {
        #[ts(type = "number")]
        id: u64,
        /// Sending tab; absent for extension views.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        origin: Option<TabId>,
        command: Command,
    },
    EngineEvent(EngineEvent),
}

/// Messages to the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum HostOutbound {
    Reply {
        #[ts(type = "number")]
        id: u64,
        reply: Reply,
    },
    Deliver {
        target: Target,
        message: Notification,
    },
    Engine {
        op: EngineOp,
    },
}

/// Operations for the extension's `chrome.tts` adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum EngineOp {
    Speak(UtteranceRequest),
    Pause,
    Resume,
    Stop,
}

/// Speech engine living on the far side of the pipe.
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    tx: mpsc::UnboundedSender<HostOutbound>,
}

impl RemoteEngine {
    pub fn new(tx: mpsc::UnboundedSender<HostOutbound>) -> Self {
        Self { tx }
    }

    fn send(&self, op: EngineOp) -> Result<(), EngineError> {
        self.tx
            .send(HostOutbound::Engine { op })
            .map_err(|_| EngineError::Disconnected)
    }
}

impl SpeechEngine for RemoteEngine {
    fn speak(&mut self, request: UtteranceRequest) -> Result<(), EngineError> {
        self.send(EngineOp::Speak(request))
    }

    fn pause(&mut self) {
        if let Err(err) = self.send(EngineOp::Pause) {
            debug!("Engine pause not sent: {err}");
        }
    }

    fn resume(&mut self) {
        if let Err(err) = self.send(EngineOp::Resume) {
            debug!("Engine resume not sent: {err}");
        }
    }

    fn stop(&mut self) {
        if let Err(err) = self.send(EngineOp::Stop) {
            debug!("Engine stop not sent: {err}");
        }
    }
}

#[derive(Debug, Clone)]
pub struct WireMessenger {
    tx: mpsc::UnboundedSender<HostOutbound>,
}

impl WireMessenger {
    pub fn new(tx: mpsc::UnboundedSender<HostOutbound>) -> Self {
        Self { tx }
    }
}

impl Messenger for WireMessenger {
    fn deliver(
        &mut self,
        target: Target,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        self.tx
            .send(HostOutbound::Deliver {
                target,
                message: notification.clone(),
            })
            .map_err(|_| DeliveryError::ChannelClosed)
    }
}

/// Serve the extension until `reader` reaches end of file.
pub async fn run_host<R, W>(config: &AppConfig, reader: R, writer: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let framing = config.framing;
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, out_rx, framing));

    let (handle, coordinator_task) = spawn_coordinator(
        config.coordinator_settings(),
        Some(RemoteEngine::new(out_tx.clone())),
        WireMessenger::new(out_tx.clone()),
    );

    let mut reader = BufReader::new(reader);
    let mut pending_replies = JoinSet::new();
    info!(%framing, "Native host ready");

    loop {
        reap_finished(&mut pending_replies);
        let frame = match read_frame(&mut reader, framing).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Extension closed the channel");
                break;
            }
            Err(err) => {
                warn!("Failed to read from extension: {err}");
                break;
            }
        };

        match serde_json::from_slice::<HostInbound>(&frame) {
            Ok(HostInbound::Request {
                id,
                origin,
                command,
            }) => {
                let action = command.action();
                let reply_rx = handle.submit(origin, command)?;
                let out_tx = out_tx.clone();
                pending_replies.spawn(async move {
                    match reply_rx.await {
                        Ok(reply) => {
                            if out_tx.send(HostOutbound::Reply { id, reply }).is_err() {
                                debug!(id, action, "Writer gone; reply dropped");
                            }
                        }
                        Err(_) => warn!(id, action, "Coordinator dropped request"),
                    }
                });
            }
            Ok(HostInbound::EngineEvent(event)) => handle.engine_event(event)?,
            Err(err) => {
                warn!("Ignoring malformed message: {err}");
                if let Some(id) = request_id(&frame) {
                    let rejected =
                        CoordinatorError::InvalidInput(format!("unrecognized request: {err}"));
                    let reply = Reply::from(&rejected);
                    if out_tx.send(HostOutbound::Reply { id, reply }).is_err() {
                        debug!(id, "Writer gone; rejection dropped");
                    }
                }
            }
        }
    }

    handle.shutdown();
    while pending_replies.join_next().await.is_some() {}
    coordinator_task.await?;
    drop(handle);
    drop(out_tx);
    writer_task.await??;
    info!("Native host stopped");
    Ok(())
}

/// Collect reply tasks that already finished. Returns how many were removed.
fn reap_finished(replies: &mut JoinSet<()>) -> usize {
    let mut reaped = 0;
    while replies.try_join_next().is_some() {
        reaped += 1;
    }
    reaped
}

/// Recover the id of a request envelope whose command failed to parse, so the
/// sender still gets its reply.
fn request_id(frame: &[u8]) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_slice(frame).ok()?;
    if value.get("kind")?.as_str()? != "request" {
        return None;
    }
    value.get("id")?.as_u64()
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<HostOutbound>,
    framing: Framing,
) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let payload = serde_json::to_vec(&message)?;
        match write_frame(&mut writer, &payload, framing).await {
            Ok(()) => {}
            Err(FrameError::Oversized { len, limit }) => {
                warn!(len, limit, "Dropping oversized outbound message");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EngineEventKind, TicketId};

    #[test]
    fn inbound_envelopes_parse() {
        let request: HostInbound = serde_json::from_str(
            r#"{"kind":"request","id":4,"origin":2,"command":{"action":"seek","index":1}}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            HostInbound::Request {
                id: 4,
                origin: Some(TabId(2)),
                command: Command::Seek { index: 1 },
            }
        );

        let event: HostInbound =
            serde_json::from_str(r#"{"kind":"engine_event","ticket":3,"type":"end"}"#).unwrap();
        assert_eq!(
            event,
            HostInbound::EngineEvent(EngineEvent::new(TicketId(3), EngineEventKind::End))
        );
    }

    #[test]
    fn outbound_envelopes_are_tagged() {
        let speak = HostOutbound::Engine {
            op: EngineOp::Speak(UtteranceRequest::new(TicketId(1), "Hi.".into(), 1.0, "")),
        };
        assert_eq!(
            serde_json::to_string(&speak).unwrap(),
            r#"{"kind":"engine","op":{"type":"speak","ticket":1,"text":"Hi.","rate":1.0}}"#
        );

        let reply = HostOutbound::Reply {
            id: 8,
            reply: Reply::ok(),
        };
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"kind":"reply","id":8,"reply":{"success":true}}"#
        );
    }

    #[test]
    fn unparsable_commands_keep_their_request_id() {
        assert_eq!(
            request_id(br#"{"kind":"request","id":5,"command":{"action":"explode"}}"#),
            Some(5)
        );
        assert_eq!(request_id(br#"{"kind":"engine_event","id":5}"#), None);
        assert_eq!(request_id(b"not json"), None);
    }

    #[tokio::test]
    async fn finished_reply_tasks_are_reaped() {
        let mut replies = JoinSet::new();
        for _ in 0..3 {
            replies.spawn(async {});
        }
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        replies.spawn(async move {
            let _ = rx.await;
        });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(reap_finished(&mut replies), 3);
        assert_eq!(replies.len(), 1);
        tx.send(()).unwrap();
        while replies.join_next().await.is_some() {}
        assert_eq!(reap_finished(&mut replies), 0);
    }

    #[test]
    fn closed_pipe_surfaces_as_disconnected_engine() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut engine = RemoteEngine::new(tx.clone());
        let result = engine.speak(UtteranceRequest::new(TicketId(1), "x".into(), 1.0, ""));
        assert_eq!(result, Err(EngineError::Disconnected));

        let mut messenger = WireMessenger::new(tx);
        assert_eq!(
            messenger.deliver(Target::Extension, &Notification::Finished),
            Err(DeliveryError::ChannelClosed)
        );
    }
}
