//! A raw, identity `tonic::codec::Codec` — encode and decode are both
//! no-ops over `Bytes`. Used by the generic director (spec §4.5.5a) to
//! forward gRPC messages it has no schema for, the same way a transparent
//! reverse proxy forwards bytes without decoding them.
//!
//! Grounded on the `StatCodec`/`BidiProtoClient` pairing in
//! `em3ndez-materialize`'s `service/src/grpc.rs`, which drives
//! `tonic::client::Grpc` with a caller-supplied codec instead of one
//! generated from a `.proto` message type.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

#[derive(Debug, Clone, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawEncoder;
    type Decoder = RawDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        RawEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawDecoder
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawEncoder;

impl Encoder for RawEncoder {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(&item);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawDecoder;

impl Decoder for RawDecoder {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        if !src.has_remaining() {
            return Ok(None);
        }
        let mut buf = BytesMut::with_capacity(src.remaining());
        buf.extend_from_slice(src.chunk());
        let len = buf.len();
        src.advance(len);
        Ok(Some(buf.freeze()))
    }
}
