use std::fmt;

/// Presents a pairing URI on desktop, usually as a QR code.
pub trait Modal: Send + Sync + fmt::Debug {
    fn open(&self, uri: &str);

    fn close(&self);
}

/// A [`Modal`] that only logs. Used when the host application supplies none.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogModal;

impl Modal for LogModal {
    fn open(&self, uri: &str) {
        info!(%uri, "scan the pairing URI with a mobile wallet");
    }

    fn close(&self) {}
}
