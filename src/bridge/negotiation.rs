//! Identifier exchange arguments carried by negotiation channels.
//!
//! The argument buffer handed to a negotiation bridge is laid out as
//! `[u32 len][input id][u32 len][output id][opaque device arguments]`.

use crate::codec::{ByteView, ByteWriter, CodecError};

/// Decoded negotiation arguments.
///
/// # Examples
///
/// ```
/// use relaybridge::NegotiationArgs;
/// let buffer = NegotiationArgs::encode(b"AB", b"CD", b"extra").unwrap();
/// let args = NegotiationArgs::decode(&buffer).unwrap();
/// assert_eq!(args.input_id(), b"AB");
/// assert_eq!(args.output_id(), b"CD");
/// assert_eq!(args.remaining(), b"extra");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NegotiationArgs {
    input_id: Vec<u8>,
    output_id: Vec<u8>,
    remaining: Vec<u8>,
}

impl NegotiationArgs {
    /// Decode the input and output identifiers, keeping any trailing bytes
    /// verbatim for the device.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Underrun`] when either length-prefixed field is
    /// incomplete.
    pub fn decode(args: &[u8]) -> Result<Self, CodecError> {
        let mut view = ByteView::new(args);
        let input_id = view.read_bytes()?.to_vec();
        let output_id = view.read_bytes()?.to_vec();
        Ok(Self {
            input_id,
            output_id,
            remaining: view.as_slice().to_vec(),
        })
    }

    /// Produce the argument buffer [`NegotiationArgs::decode`] reads.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SequenceTooLong`] if an identifier does not fit
    /// its length prefix.
    pub fn encode(input_id: &[u8], output_id: &[u8], remaining: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(ByteWriter::with_capacity(input_id.len() + output_id.len() + remaining.len() + 8)
            .bytes(input_id)?
            .bytes(output_id)?
            .raw(remaining)
            .into_vec())
    }

    /// Identifier this side listens on.
    #[must_use]
    pub fn input_id(&self) -> &[u8] { &self.input_id }

    /// Identifier this side writes to.
    #[must_use]
    pub fn output_id(&self) -> &[u8] { &self.output_id }

    /// Device-specific arguments following the identifiers.
    #[must_use]
    pub fn remaining(&self) -> &[u8] { &self.remaining }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::NegotiationArgs;
    use crate::codec::CodecError;

    #[test]
    fn decodes_identifiers_and_keeps_remainder() {
        let buffer = [
            2, 0, 0, 0, 0x41, 0x42, //
            2, 0, 0, 0, 0x43, 0x44, //
            b'e', b'x', b't', b'r', b'a',
        ];
        let args = NegotiationArgs::decode(&buffer).expect("valid arguments");
        assert_eq!(args.input_id(), &[0x41, 0x42]);
        assert_eq!(args.output_id(), &[0x43, 0x44]);
        assert_eq!(args.remaining(), b"extra");
    }

    #[test]
    fn remainder_may_be_empty() {
        let args = NegotiationArgs::decode(&NegotiationArgs::encode(b"in", b"out", b"").expect("short identifiers"))
            .expect("valid arguments");
        assert!(args.remaining().is_empty());
    }

    #[rstest]
    #[case::empty(&[][..])]
    #[case::only_input(&[1, 0, 0, 0, 0x41][..])]
    #[case::short_output(&[1, 0, 0, 0, 0x41, 5, 0, 0, 0, 0x43][..])]
    fn incomplete_buffers_are_rejected(#[case] buffer: &[u8]) {
        let err = NegotiationArgs::decode(buffer).expect_err("incomplete buffer");
        assert!(matches!(err, CodecError::Underrun { .. }));
    }
}
