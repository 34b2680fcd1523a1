use std::time::Duration;

use async_trait::async_trait;
use flume::TrySendError;
use fm_client::Task;
use fm_msp::{MspMessage, MspRequest};
use fm_types::{PositionFix, RuntimeConfig};
use tokio::{
    select,
    sync::watch,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::{Action, DisplayEvent, FollowConfig, Follower};

pub fn create_task(
    config: FollowConfig,
    fix_rx: flume::Receiver<PositionFix>,
    msg_rx: flume::Receiver<MspMessage>,
    req_tx: flume::Sender<MspRequest>,
    config_rx: watch::Receiver<RuntimeConfig>,
) -> anyhow::Result<FollowTask> {
    if config.tick_ms == 0 {
        anyhow::bail!("follow.tick_ms must be greater than zero");
    }

    let (display_tx, display_rx) = flume::bounded(256);

    Ok(FollowTask {
        config,
        fix_rx,
        msg_rx,
        req_tx,
        config_rx,
        display_tx,
        display_rx,
    })
}

/// Runs the [`Follower`] state machine: multiplexes the tick timer, position
/// fixes, flight controller replies and config snapshots, and carries out the
/// resulting actions.
pub struct FollowTask {
    config: FollowConfig,
    fix_rx: flume::Receiver<PositionFix>,
    msg_rx: flume::Receiver<MspMessage>,
    req_tx: flume::Sender<MspRequest>,
    config_rx: watch::Receiver<RuntimeConfig>,
    display_tx: flume::Sender<DisplayEvent>,
    display_rx: flume::Receiver<DisplayEvent>,
}

impl FollowTask {
    pub fn display(&self) -> flume::Receiver<DisplayEvent> {
        self.display_rx.clone()
    }
}

#[async_trait]
impl Task for FollowTask {
    fn name(&self) -> &'static str {
        "follow"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let Self {
            config,
            fix_rx,
            msg_rx,
            req_tx,
            mut config_rx,
            display_tx,
            ..
        } = *self;

        let loop_fut = async move {
            let mut ticker = interval(Duration::from_millis(config.tick_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut follower = Follower::new(config, *config_rx.borrow());
            let mut config_open = true;

            loop {
                let actions = select! {
                    _ = ticker.tick() => follower.on_tick(),

                    fix = fix_rx.recv_async() => {
                        let fix = fix?;
                        follower.on_fix(fix)
                    }

                    msg = msg_rx.recv_async() => {
                        let msg = msg?;
                        follower.on_message(&msg)
                    }

                    res = config_rx.changed(), if config_open => {
                        if res.is_err() {
                            debug!("runtime config publisher dropped");
                            config_open = false;
                        } else {
                            let snapshot = *config_rx.borrow();
                            debug!("new runtime config: {:?}", snapshot);
                            follower.on_config(snapshot);
                        }

                        Vec::new()
                    }
                };

                for action in actions {
                    match action {
                        Action::Send(req) => match req_tx.try_send(req) {
                            Ok(()) => {}
                            Err(TrySendError::Full(req)) => {
                                warn!("msp request queue full, dropping {:?}", req.command());
                            }
                            Err(TrySendError::Disconnected(_)) => {
                                anyhow::bail!("msp request channel closed")
                            }
                        },
                        Action::Display(evt) => {
                            // the display is best effort
                            if display_tx.try_send(evt).is_err() {
                                trace!("display channel full, dropping event");
                            }
                        }
                    }
                }
            }

            #[allow(unreachable_code)]
            Ok::<_, anyhow::Error>(())
        };

        select! {
          _ = cancel.cancelled() => {}
          res = loop_fut => { res? }
        }

        Ok(())
    }
}
