use bytes::Bytes;

/// A discrete unit of payload extracted from, or destined for, a byte stream.
///
/// Channels multiplex independent logical lanes over one connection. The
/// numbering is up to the protocol; nothing here validates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    pub channel: u32,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(channel: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
