use std::time::Duration;

use tokio_serial::{SerialPort, SerialStream};

/// How long a serial task waits before reopening a port that failed.
pub const REOPEN_DELAY: Duration = Duration::from_secs(1);

/// A byte stream whose line speed can change while it is open.
pub trait SetBaudRate {
    fn set_baud(&mut self, baud: u32) -> tokio_serial::Result<()>;
}

impl SetBaudRate for SerialStream {
    fn set_baud(&mut self, baud: u32) -> tokio_serial::Result<()> {
        self.set_baud_rate(baud)
    }
}

pub fn open(path: &str, baud: u32) -> tokio_serial::Result<SerialStream> {
    SerialStream::open(&tokio_serial::new(path, baud))
}
