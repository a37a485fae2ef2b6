use bytes::{BufMut, Bytes, BytesMut};

/// Encoding side of every frame layer (TPKT, COTP, S7 header, parameters).
pub trait WireEncode {
    type Error: std::fmt::Debug + Send + Sync + 'static;
    type Context;

    /// Exact number of bytes `encode_to` will append.
    fn encoded_len(&self, ctx: &Self::Context) -> usize;

    fn encode_to<B: BufMut>(&self, dst: &mut B, ctx: &Self::Context) -> Result<(), Self::Error>;

    /// Encode into a freshly allocated, exactly sized buffer.
    fn to_bytes(&self, ctx: &Self::Context) -> Result<Bytes, Self::Error> {
        let mut buf = BytesMut::with_capacity(self.encoded_len(ctx));
        self.encode_to(&mut buf, ctx)?;
        Ok(buf.freeze())
    }
}

/// Zero-copy decoding side of every frame layer.
pub trait WireDecode: Sized {
    type Error: std::fmt::Debug + Send + Sync + 'static;
    type Context;

    /// Parse from `input`, returning the remaining slice and the parsed value.
    /// `parent` must own `input` so implementations can hand out `Bytes::slice_ref` views.
    fn parse<'a>(
        input: &'a [u8],
        parent: &Bytes,
        ctx: &Self::Context,
    ) -> Result<(&'a [u8], Self), Self::Error>;
}
