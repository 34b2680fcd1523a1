use async_trait::async_trait;
use fm_client::Task;
use fm_follow::{DisplayEvent, DisplayRow};
use fm_msp::command::NavMode;
use tokio::select;
use tokio_util::sync::CancellationToken;

pub fn create_task(display_rx: flume::Receiver<DisplayEvent>) -> anyhow::Result<DisplayTask> {
    Ok(DisplayTask { display_rx })
}

/// Renders display events as log lines in place of the status screen.
pub struct DisplayTask {
    display_rx: flume::Receiver<DisplayEvent>,
}

fn render(evt: &DisplayEvent) -> String {
    match evt {
        DisplayEvent::Initialised => "followme ready".to_owned(),
        DisplayEvent::GpsFix {
            time,
            satellites,
            quality,
        } => format!("{} fix {} sats {}", time.format("%H:%M:%S"), quality, satellites),
        DisplayEvent::Mode {
            connection,
            nav_mode,
        } => format!("link {} nav {}", connection, NavMode::label(*nav_mode)),
        DisplayEvent::FirmwareVersion(version) => format!("INAV {}", version),
        DisplayEvent::VehicleSats { satellites, hdop } => {
            format!("vsat {} hdop {:.2}", satellites, f32::from(*hdop) / 100.0)
        }
        DisplayEvent::VehiclePosition { distance, bearing } => {
            format!("vpos {:.0}m {}°", distance, bearing)
        }
        DisplayEvent::Clear(row) => {
            let row = match row {
                DisplayRow::Time => "time",
                DisplayRow::Gps => "gps",
                DisplayRow::Firmware => "firmware",
                DisplayRow::VehicleSats => "vsat",
                DisplayRow::VehiclePosition => "vpos",
            };
            format!("clear {}", row)
        }
    }
}

#[async_trait]
impl Task for DisplayTask {
    fn name(&self) -> &'static str {
        "display"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let display_rx = self.display_rx;

        let loop_fut = async move {
            loop {
                let evt = display_rx.recv_async().await?;
                info!("{}", render(&evt));
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use fm_follow::ConnectionState;

    #[test]
    fn renders_each_row() {
        assert_eq!(
            render(&DisplayEvent::GpsFix {
                time: NaiveTime::from_hms_opt(9, 5, 7).unwrap(),
                satellites: 11,
                quality: 1,
            }),
            "09:05:07 fix 1 sats 11"
        );
        assert_eq!(
            render(&DisplayEvent::Mode {
                connection: ConnectionState::Ready,
                nav_mode: 1,
            }),
            "link ready nav hold"
        );
        assert_eq!(
            render(&DisplayEvent::VehicleSats {
                satellites: 14,
                hdop: 999,
            }),
            "vsat 14 hdop 9.99"
        );
        assert_eq!(
            render(&DisplayEvent::VehiclePosition {
                distance: 49.6,
                bearing: 271,
            }),
            "vpos 50m 271°"
        );
        assert_eq!(
            render(&DisplayEvent::Clear(DisplayRow::VehiclePosition)),
            "clear vpos"
        );
    }
}
