use anyhow::Context;
use async_trait::async_trait;
use fm_client::{
    serial::{self, SetBaudRate, REOPEN_DELAY},
    Task,
};
use fm_types::{PositionFix, RuntimeConfig};
use futures::StreamExt;
use tokio::{io::AsyncRead, select, sync::watch, time::sleep};
use tokio_util::{codec::FramedRead, sync::CancellationToken};
use tracing::*;

use crate::{GpsConfig, NmeaCodec};

pub fn create_task(
    config: GpsConfig,
    config_rx: watch::Receiver<RuntimeConfig>,
) -> anyhow::Result<GpsTask> {
    let (fix_tx, fix_rx) = flume::bounded(256);

    Ok(GpsTask {
        path: config.path,
        fix_tx,
        fix_rx,
        config_rx,
    })
}

/// Reads NMEA from the handheld GPS receiver and publishes every new
/// [`PositionFix`].
pub struct GpsTask {
    path: String,
    fix_tx: flume::Sender<PositionFix>,
    fix_rx: flume::Receiver<PositionFix>,
    config_rx: watch::Receiver<RuntimeConfig>,
}

impl GpsTask {
    pub fn fixes(&self) -> flume::Receiver<PositionFix> {
        self.fix_rx.clone()
    }
}

#[async_trait]
impl Task for GpsTask {
    fn name(&self) -> &'static str {
        "gps"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let Self {
            path,
            fix_tx,
            config_rx,
            ..
        } = *self;

        let baud = config_rx.borrow().gps_baud;

        debug!("opening gps receiver at {} ({} baud)", path, baud);
        let port = serial::open(&path, baud)
            .with_context(|| format!("failed to open gps serial port {path}"))?;

        let reopen = move |baud: u32| {
            debug!("reopening gps receiver at {} ({} baud)", path, baud);
            serial::open(&path, baud)
        };

        select! {
          _ = cancel.cancelled() => {}
          _ = forward_fixes(port, baud, reopen, fix_tx, config_rx) => {}
        }

        Ok(())
    }
}

/// Publishes fixes decoded from `port` and follows baud edits. A read error,
/// a closed port or a failed baud change drops the port and `reopen` is
/// retried every [`REOPEN_DELAY`] until it succeeds. Never returns.
async fn forward_fixes<P, F>(
    mut port: P,
    mut baud: u32,
    mut reopen: F,
    fix_tx: flume::Sender<PositionFix>,
    mut config_rx: watch::Receiver<RuntimeConfig>,
) where
    P: AsyncRead + SetBaudRate + Unpin,
    F: FnMut(u32) -> tokio_serial::Result<P>,
{
    let mut config_open = true;

    loop {
        let mut framed = FramedRead::new(port, NmeaCodec::new());

        let failure = loop {
            select! {
                fix = framed.next() => {
                    match fix {
                        Some(Ok(fix)) => {
                            trace!("gps fix: {:?}", fix);
                            let _ = fix_tx.send_async(fix).await;
                        }
                        Some(Err(err)) => {
                            break anyhow::Error::new(err).context("failed to read from gps serial port")
                        }
                        None => break anyhow::anyhow!("gps serial port closed"),
                    }
                }

                res = config_rx.changed(), if config_open => {
                    if res.is_err() {
                        debug!("runtime config publisher dropped, keeping {} baud", baud);
                        config_open = false;
                        continue;
                    }

                    let new_baud = config_rx.borrow().gps_baud;
                    if new_baud != baud {
                        info!("changing gps baud rate from {} to {}", baud, new_baud);
                        baud = new_baud;
                        if let Err(err) = framed.get_mut().set_baud(new_baud) {
                            break anyhow::Error::new(err).context("failed to change gps baud rate");
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
                Err(err) => warn!("failed to reopen gps serial port: {}", err),
            }
        };

        info!("gps serial port reopened ({} baud)", baud);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        io::Cursor,
        pin::Pin,
        sync::{Arc, Mutex},
        task::{Context, Poll},
        time::Duration,
    };

    use tokio::{io::ReadBuf, time::timeout};
    use tokio_serial::{Error, ErrorKind};

    use super::*;
    use crate::nmea;

    /// A port that plays back `bytes` and then reports end of file.
    struct Playback(Cursor<Vec<u8>>);

    impl Playback {
        fn new(sentences: &[String]) -> Self {
            let bytes = sentences
                .iter()
                .map(|body| format!("${}*{:02X}\r\n", body, nmea::checksum(body.as_bytes())))
                .collect::<String>();
            Playback(Cursor::new(bytes.into_bytes()))
        }
    }

    impl AsyncRead for Playback {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl SetBaudRate for Playback {
        fn set_baud(&mut self, _baud: u32) -> tokio_serial::Result<()> {
            Ok(())
        }
    }

    fn gga(time: &str) -> String {
        format!("GPGGA,{time},5321.6802,N,00630.3372,W,1,08,1.03,61.7,M,55.2,M,,")
    }

    #[tokio::test(start_paused = true)]
    async fn closed_port_is_reopened() {
        let first = Playback::new(&[gga("120000.00")]);

        let mut ports: VecDeque<tokio_serial::Result<Playback>> = VecDeque::from(vec![
            Err(Error::new(ErrorKind::NoDevice, "unplugged")),
            Ok(Playback::new(&[gga("120005.00")])),
        ]);
        let opened_at = Arc::new(Mutex::new(Vec::new()));
        let reopen = {
            let opened_at = opened_at.clone();
            move |baud: u32| {
                opened_at.lock().unwrap().push(baud);
                ports
                    .pop_front()
                    .unwrap_or_else(|| Err(Error::new(ErrorKind::NoDevice, "unplugged")))
            }
        };

        let (fix_tx, fix_rx) = flume::bounded(8);
        let (_config_tx, config_rx) = watch::channel(RuntimeConfig::default());
        let pump = tokio::spawn(forward_fixes(first, 9600, reopen, fix_tx, config_rx));

        let first_fix = timeout(Duration::from_secs(10), fix_rx.recv_async())
            .await
            .unwrap()
            .unwrap();
        let second_fix = timeout(Duration::from_secs(10), fix_rx.recv_async())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first_fix.time, chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(second_fix.time, chrono::NaiveTime::from_hms_opt(12, 0, 5).unwrap());
        assert_eq!(*opened_at.lock().unwrap(), vec![9600, 9600]);

        pump.abort();
    }
}
