//! Payload codecs carried inside frames
//!
//! - [`CtsGrant`]: the start time a CTS sender has reserved on the data channel
//! - [`SeqTsHeader`]: sequence number and send timestamp prefixed to traffic payloads

use std::time::Duration;

use crate::error::ParseError;

/// Start time advertised by a CTS sent on the control channel.
///
/// Encoded as the start time in nanoseconds since simulation start,
/// 8 bytes little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtsGrant {
    pub start: Duration,
}

impl CtsGrant {
    pub const ENCODED_LEN: usize = 8;

    pub fn new(start: Duration) -> Self {
        Self { start }
    }

    pub fn encode(&self) -> Vec<u8> {
        let nanos = u64::try_from(self.start.as_nanos()).unwrap_or(u64::MAX);
        nanos.to_le_bytes().to_vec()
    }

    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        let bytes: [u8; 8] = data
            .try_into()
            .map_err(|_| ParseError::InvalidGrant { len: data.len() })?;
        Ok(Self {
            start: Duration::from_nanos(u64::from_le_bytes(bytes)),
        })
    }
}

/// Sequence/timestamp header at the front of every traffic payload
///
/// Layout (network byte order): 4-byte sequence, 8-byte send time in ns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqTsHeader {
    pub seq: u32,
    pub sent_at: Duration,
}

impl SeqTsHeader {
    pub const ENCODED_LEN: usize = 12;

    pub fn new(seq: u32, sent_at: Duration) -> Self {
        Self { seq, sent_at }
    }

    /// Build a payload of exactly `size` bytes (at least the header length)
    /// that starts with this header.
    pub fn payload(&self, size: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size.max(Self::ENCODED_LEN));
        buf.extend_from_slice(&self.seq.to_be_bytes());
        let nanos = u64::try_from(self.sent_at.as_nanos()).unwrap_or(u64::MAX);
        buf.extend_from_slice(&nanos.to_be_bytes());
        buf.resize(size.max(Self::ENCODED_LEN), 0);
        buf
    }

    /// Read the header from the front of a payload
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < Self::ENCODED_LEN {
            return Err(ParseError::Incomplete {
                needed: Self::ENCODED_LEN - data.len(),
            });
        }
        let mut seq = [0u8; 4];
        seq.copy_from_slice(&data[..4]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&data[4..12]);
        Ok(Self {
            seq: u32::from_be_bytes(seq),
            sent_at: Duration::from_nanos(u64::from_be_bytes(ts)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_layout_is_little_endian_nanos() {
        let grant = CtsGrant::new(Duration::from_nanos(0x0102));
        assert_eq!(grant.encode(), vec![0x02, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_grant_rejects_wrong_length() {
        assert_eq!(
            CtsGrant::decode(&[1, 2, 3]),
            Err(ParseError::InvalidGrant { len: 3 })
        );
        assert!(CtsGrant::decode(&[0; 9]).is_err());
        assert!(CtsGrant::decode(&[]).is_err());
    }

    #[test]
    fn test_seq_ts_payload_padding() {
        let hdr = SeqTsHeader::new(42, Duration::from_micros(1500));
        let payload = hdr.payload(1024);
        assert_eq!(payload.len(), 1024);
        assert_eq!(SeqTsHeader::decode(&payload).unwrap(), hdr);
    }

    #[test]
    fn test_seq_ts_short_payload() {
        assert_eq!(
            SeqTsHeader::decode(&[0; 5]),
            Err(ParseError::Incomplete { needed: 7 })
        );
        // Requested sizes below the header length are rounded up
        assert_eq!(SeqTsHeader::new(1, Duration::ZERO).payload(4).len(), 12);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn grant_accepts_only_eight_bytes(data in prop::collection::vec(any::<u8>(), 0..32)) {
                prop_assert_eq!(CtsGrant::decode(&data).is_ok(), data.len() == CtsGrant::ENCODED_LEN);
            }

            #[test]
            fn seq_ts_ignores_trailing_padding(
                seq in any::<u32>(),
                nanos in any::<u64>(),
                size in 0usize..2048,
                fill in any::<u8>(),
            ) {
                let hdr = SeqTsHeader::new(seq, Duration::from_nanos(nanos));
                let mut payload = hdr.payload(size);
                for b in payload.iter_mut().skip(SeqTsHeader::ENCODED_LEN) {
                    *b = fill;
                }
                prop_assert_eq!(SeqTsHeader::decode(&payload).unwrap(), hdr);
            }
        }
    }
}
