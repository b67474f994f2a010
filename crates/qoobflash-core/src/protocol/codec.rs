//! Command/response frame codec.
//!
//! `encode` and `decode` are pure: no transport access, no retries. Frames
//! are fixed-layout byte sequences; the 24-bit big-endian address and 16-bit
//! big-endian length fields follow the vendor utility's layout.

use crate::error::{Error, Result};
use crate::transport::UNIT_LEN;

use super::{Operation, ProtocolTable};

/// Offset of the status byte in a response frame
const RESP_STATUS: usize = 0;
/// Offset of the 16-bit payload length field
const RESP_LEN: usize = 1;
/// Offset of the payload
const RESP_PAYLOAD: usize = 3;

/// An encoded command frame, ready to be split into transport units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// The logical frame: opcode, operands, trailing checksum.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Split into fixed-size transport units, zero-padding the last one.
    pub fn units(&self) -> Vec<[u8; UNIT_LEN]> {
        self.bytes
            .chunks(UNIT_LEN)
            .map(|chunk| {
                let mut unit = [0u8; UNIT_LEN];
                unit[..chunk.len()].copy_from_slice(chunk);
                unit
            })
            .collect()
    }
}

/// Encode a typed operation into a command frame.
pub fn encode(table: &ProtocolTable, op: &Operation<'_>) -> Frame {
    let mut bytes = Vec::with_capacity(UNIT_LEN);
    bytes.push(op.opcode());

    match op {
        Operation::Ident => {}
        Operation::Bus { acquire } => {
            bytes.push(0x00);
            bytes.push(u8::from(*acquire));
        }
        Operation::Erase { sector } => {
            bytes.push(*sector);
            // Always zero; the vendor utility writes these as a 16-bit field
            // even though sub-sector erase addressing is impossible
            bytes.push(0x00);
            bytes.push(0x00);
        }
        Operation::Write { addr, data } => {
            push_addr_len(&mut bytes, *addr, data.len() as u16);
            bytes.extend_from_slice(data);
        }
        Operation::Read { addr, len } => {
            push_addr_len(&mut bytes, *addr, *len);
        }
    }

    bytes.push((table.checksum)(&bytes));
    Frame { bytes }
}

fn push_addr_len(bytes: &mut Vec<u8>, addr: u32, len: u16) {
    bytes.push((addr >> 16) as u8);
    bytes.push((addr >> 8) as u8);
    bytes.push(addr as u8);
    bytes.push((len >> 8) as u8);
    bytes.push(len as u8);
}

/// Logical length of the response frame for `op`, checksum included.
pub fn response_len(op: &Operation<'_>) -> usize {
    RESP_PAYLOAD + op.response_payload_len() + 1
}

/// Number of transport units the response to `op` occupies.
pub fn response_units(op: &Operation<'_>) -> usize {
    response_len(op).div_ceil(UNIT_LEN)
}

/// Decode a response to `op` from reassembled transport units.
///
/// Validation order matters for error classification: the trailing checksum
/// is verified first (a corrupt frame is `ChecksumInvalid`, never
/// `ProtocolMismatch`), then the declared payload length against what the
/// command calls for, then the status byte.
pub fn decode(table: &ProtocolTable, op: &Operation<'_>, raw: &[u8]) -> Result<Vec<u8>> {
    let expected = op.response_payload_len();
    let logical = response_len(op);

    if raw.len() < logical {
        return Err(Error::ProtocolMismatch("response truncated"));
    }

    let frame = &raw[..logical];
    let (body, csum) = frame.split_at(logical - 1);
    if (table.checksum)(body) != csum[0] {
        return Err(Error::ChecksumInvalid);
    }

    let declared = u16::from_be_bytes([frame[RESP_LEN], frame[RESP_LEN + 1]]) as usize;
    if declared != expected {
        return Err(Error::ProtocolMismatch("response length field"));
    }

    let status = frame[RESP_STATUS];
    if status != 0 {
        return Err(Error::Device { status });
    }

    Ok(frame[RESP_PAYLOAD..RESP_PAYLOAD + expected].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{opcodes, QOOB_PRO_V1};

    /// Build a well-formed response frame for tests.
    fn make_response(status: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![status];
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        frame.extend_from_slice(payload);
        frame.push((QOOB_PRO_V1.checksum)(&frame));
        // pad to whole units like the wire does
        let padded = frame.len().div_ceil(UNIT_LEN) * UNIT_LEN;
        frame.resize(padded, 0);
        frame
    }

    #[test]
    fn encodes_read_frame_layout() {
        let frame = encode(
            &QOOB_PRO_V1,
            &Operation::Read {
                addr: 0x012345,
                len: 0x0100,
            },
        );
        let b = frame.as_bytes();
        assert_eq!(b[0], opcodes::READ);
        assert_eq!(&b[1..4], &[0x01, 0x23, 0x45]);
        assert_eq!(&b[4..6], &[0x01, 0x00]);
        assert_eq!(b.len(), 7);
        // whole frame sums to zero
        assert_eq!(b.iter().fold(0u8, |a, x| a.wrapping_add(*x)), 0);
    }

    #[test]
    fn encodes_write_frame_with_payload() {
        let page = [0xABu8; 256];
        let frame = encode(
            &QOOB_PRO_V1,
            &Operation::Write {
                addr: 0x010000,
                data: &page,
            },
        );
        let b = frame.as_bytes();
        assert_eq!(b[0], opcodes::WRITE);
        assert_eq!(&b[1..4], &[0x01, 0x00, 0x00]);
        assert_eq!(&b[4..6], &[0x01, 0x00]);
        assert_eq!(&b[6..262], &page[..]);
        assert_eq!(b.len(), 263);
        assert_eq!(frame.units().len(), 5);
        // padding after the checksum is zero
        let units = frame.units();
        assert!(units[4][263 - 4 * UNIT_LEN..].iter().all(|&x| x == 0));
    }

    #[test]
    fn encodes_bus_and_erase_operands() {
        let bus = encode(&QOOB_PRO_V1, &Operation::Bus { acquire: true });
        assert_eq!(&bus.as_bytes()[..3], &[opcodes::BUS, 0x00, 0x01]);

        let erase = encode(&QOOB_PRO_V1, &Operation::Erase { sector: 7 });
        assert_eq!(&erase.as_bytes()[..4], &[opcodes::ERASE, 7, 0x00, 0x00]);
    }

    #[test]
    fn decodes_ident_payload() {
        let raw = make_response(0, &[1, 21, 16, 8]);
        let payload = decode(&QOOB_PRO_V1, &Operation::Ident, &raw).unwrap();
        assert_eq!(payload, vec![1, 21, 16, 8]);
    }

    #[test]
    fn bad_checksum_is_checksum_invalid_not_protocol_mismatch() {
        let mut raw = make_response(0, &[1, 21, 16, 8]);
        raw[7] ^= 0xFF; // corrupt the checksum byte
        let err = decode(&QOOB_PRO_V1, &Operation::Ident, &raw).unwrap_err();
        assert_eq!(err, Error::ChecksumInvalid);
    }

    #[test]
    fn corrupt_payload_is_checksum_invalid() {
        let mut raw = make_response(0, &[1, 21, 16, 8]);
        raw[4] ^= 0x01;
        let err = decode(&QOOB_PRO_V1, &Operation::Ident, &raw).unwrap_err();
        assert_eq!(err, Error::ChecksumInvalid);
    }

    #[test]
    fn wrong_declared_length_is_protocol_mismatch() {
        // Well-checksummed frame whose length field doesn't match the command
        let mut frame = vec![0u8, 0x00, 0x02, 1, 21, 16, 8];
        frame.push((QOOB_PRO_V1.checksum)(&frame));
        frame.resize(UNIT_LEN, 0);
        let err = decode(&QOOB_PRO_V1, &Operation::Ident, &frame).unwrap_err();
        assert!(matches!(err, Error::ProtocolMismatch(_)));
    }

    #[test]
    fn nonzero_status_carries_raw_code() {
        let raw = make_response(0x42, &[0, 0, 0, 0]);
        let err = decode(&QOOB_PRO_V1, &Operation::Ident, &raw).unwrap_err();
        assert_eq!(err, Error::Device { status: 0x42 });
    }

    #[test]
    fn read_response_round_trips_page() {
        let page: Vec<u8> = (0..=255u8).collect();
        let raw = make_response(0, &page);
        let op = Operation::Read { addr: 0, len: 256 };
        assert_eq!(response_units(&op), 5);
        let payload = decode(&QOOB_PRO_V1, &op, &raw).unwrap();
        assert_eq!(payload, page);
    }
}
