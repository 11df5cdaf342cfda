// timesync-rs: pushes host wall-clock time to a serial-attached device

pub mod cancel;
pub mod clock;
pub mod codec;
pub mod config;
pub mod keyboard;
pub mod sender;
pub mod serial;

pub use cancel::{CancellationSource, CancellationToken};
pub use clock::{Clock, SystemClock};
pub use sender::{SendReport, SenderError, SenderSettings, TimeSender};
pub use serial::{ConnectionError, SerialLink, TimeSink};
