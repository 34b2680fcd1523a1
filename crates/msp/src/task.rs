use anyhow::Context;
use async_trait::async_trait;
use fm_client::{
    serial::{self, SetBaudRate, REOPEN_DELAY},
    Task,
};
use fm_types::RuntimeConfig;
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    select,
    sync::watch,
    time::sleep,
};
use tokio_util::{codec::Framed, sync::CancellationToken};
use tracing::*;

use crate::{MspCodec, MspConfig, MspMessage, MspRequest};

pub fn create_task(
    config: MspConfig,
    config_rx: watch::Receiver<RuntimeConfig>,
) -> anyhow::Result<MspTask> {
    let (msg_tx, msg_rx) = flume::bounded(256);
    let (req_tx, req_rx) = flume::bounded(256);

    Ok(MspTask {
        path: config.path,
        msg_tx,
        msg_rx,
        req_tx,
        req_rx,
        config_rx,
    })
}

/// Owns the serial link to the flight controller. Requests sent on
/// [`MspTask::requests`] are framed and written in order; every decoded frame
/// is published on [`MspTask::messages`].
pub struct MspTask {
    path: String,
    msg_tx: flume::Sender<MspMessage>,
    msg_rx: flume::Receiver<MspMessage>,
    req_tx: flume::Sender<MspRequest>,
    req_rx: flume::Receiver<MspRequest>,
    config_rx: watch::Receiver<RuntimeConfig>,
}

impl MspTask {
    pub fn messages(&self) -> flume::Receiver<MspMessage> {
        self.msg_rx.clone()
    }

    pub fn requests(&self) -> flume::Sender<MspRequest> {
        self.req_tx.clone()
    }
}

#[async_trait]
impl Task for MspTask {
    fn name(&self) -> &'static str {
        "msp"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let Self {
            path,
            msg_tx,
            req_rx,
            config_rx,
            ..
        } = *self;

        let baud = config_rx.borrow().msp_baud;

        debug!("opening flight controller at {} ({} baud)", path, baud);
        let port = serial::open(&path, baud)
            .with_context(|| format!("failed to open msp serial port {path}"))?;

        let reopen = move |baud: u32| {
            debug!("reopening flight controller at {} ({} baud)", path, baud);
            serial::open(&path, baud)
        };

        select! {
          _ = cancel.cancelled() => {}
          _ = serve(port, baud, reopen, msg_tx, req_rx, config_rx) => {}
        }

        Ok(())
    }
}

/// Moves frames between `port` and the message/request channels and follows
/// baud edits. An I/O error, a closed port or a failed baud change drops the
/// port and `reopen` is retried every [`REOPEN_DELAY`] until it succeeds.
/// Requests queued meanwhile are written once the port is back.
async fn serve<P, F>(
    mut port: P,
    mut baud: u32,
    mut reopen: F,
    msg_tx: flume::Sender<MspMessage>,
    req_rx: flume::Receiver<MspRequest>,
    mut config_rx: watch::Receiver<RuntimeConfig>,
) where
    P: AsyncRead + AsyncWrite + SetBaudRate + Unpin,
    F: FnMut(u32) -> tokio_serial::Result<P>,
{
    let mut config_open = true;
    let mut requests_open = true;

    loop {
        let mut framed = Framed::new(port, MspCodec::new());

        let failure = loop {
            select! {
                msg = framed.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if !msg.valid {
                                debug!("crc mismatch on msp frame for command {}", msg.command);
                            }
                            trace!("msp message: {:?}", msg);
                            let _ = msg_tx.send_async(msg).await;
                        }
                        Some(Err(err)) => {
                            break anyhow::Error::new(err).context("failed to read from msp serial port")
                        }
                        None => break anyhow::anyhow!("msp serial port closed"),
                    }
                }

                req = req_rx.recv_async(), if requests_open => {
                    let req = match req {
                        Ok(req) => req,
                        Err(_) => {
                            debug!("every msp request sender dropped");
                            requests_open = false;
                            continue;
                        }
                    };

                    trace!("msp request: {:?}", req);
                    if let Err(err) = framed.send(req).await {
                        break anyhow::Error::new(err).context("failed to write to msp serial port");
                    }
                }

                res = config_rx.changed(), if config_open => {
                    if res.is_err() {
                        debug!("runtime config publisher dropped, keeping {} baud", baud);
                        config_open = false;
                        continue;
                    }

                    let new_baud = config_rx.borrow().msp_baud;
                    if new_baud != baud {
                        info!("changing msp baud rate from {} to {}", baud, new_baud);
                        baud = new_baud;
                        if let Err(err) = framed.get_mut().set_baud(new_baud) {
                            break anyhow::Error::new(err).context("failed to change msp baud rate");
                        }
                    }
                }
            }
        };

        error!("{:#}, reopening in {:?}", failure, REOPEN_DELAY);
        drop(framed);

        port = loop {
            sleep(REOPEN_DELAY).await;

            match reopen(baud) {
                Ok(port) => break port,
                Err(err) => warn!("failed to reopen msp serial port: {}", err),
            }
        };

        info!("msp serial port reopened ({} baud)", baud);
    }
}
