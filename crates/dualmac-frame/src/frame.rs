//! Complete MAC frames

use crate::header::{MacHeader, FCS_SIZE};

/// A MAC frame: header plus payload, FCS implied
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    pub header: MacHeader,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(header: MacHeader, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// Frame with an empty body (RTS, ACK)
    pub fn control(header: MacHeader) -> Self {
        Self {
            header,
            payload: Vec::new(),
        }
    }

    /// Bytes on air: header, payload and FCS
    pub fn size(&self) -> usize {
        self.header.serialized_size() + self.payload.len() + FCS_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::MacAddress;

    #[test]
    fn test_data_frame_size() {
        let hdr = MacHeader::data(MacAddress::allocate(0), MacAddress::allocate(1));
        let frame = Frame::new(hdr, vec![0; 1024]);
        assert_eq!(frame.size(), 1024 + 24 + 4);
    }
}
