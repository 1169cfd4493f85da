//! Tokio codec over the default wire format, for transports built on
//! `tokio_util::codec::Framed`.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::core::frame::Frame;
use crate::core::framer::LengthPrefixedFramer;
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec {
    framer: LengthPrefixedFramer,
}

impl FrameCodec {
    pub fn new(framer: LengthPrefixedFramer) -> Self {
        Self { framer }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = PipelineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, PipelineError> {
        self.framer.decode_one(src)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = PipelineError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), PipelineError> {
        self.framer.encode_one(&item, dst)
    }
}
