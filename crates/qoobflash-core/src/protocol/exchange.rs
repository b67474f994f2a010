//! One command/response exchange, modelled as an explicit state machine.
//!
//! Keeping the phase explicit (rather than ad hoc blocking calls) makes
//! timeout and checksum handling uniform across every command and lets tests
//! observe exactly where an exchange died. An exchange never retries; retry
//! policy belongs to the programmer, which knows what a command costs.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::{Transport, UNIT_LEN};

use super::{codec, Operation, ProtocolTable};

/// Exchange lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing sent yet
    Idle,
    /// Command frame handed to the transport
    Sent,
    /// Waiting for response units
    AwaitingResponse,
    /// Response frame decoded (including device-status rejections: the frame
    /// itself was intact)
    Decoded,
    /// The device never answered
    TimedOut,
    /// The response arrived but failed its checksum
    ChecksumInvalid,
}

/// A single request/response exchange over a transport.
pub struct Exchange<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    table: &'a ProtocolTable,
    phase: Phase,
}

impl<'a, T: Transport + ?Sized> Exchange<'a, T> {
    /// Prepare an exchange; nothing touches the transport until [`Self::run`].
    pub fn new(transport: &'a mut T, table: &'a ProtocolTable) -> Self {
        Self {
            transport,
            table,
            phase: Phase::Idle,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Drive the exchange to completion: encode, send, receive, decode.
    ///
    /// Returns the decoded response payload. The device has no pipelining, so
    /// this blocks until every response unit arrives or `timeout` expires on
    /// one of them.
    pub fn run(&mut self, op: &Operation<'_>, timeout: Duration) -> Result<Vec<u8>> {
        debug_assert_eq!(self.phase, Phase::Idle, "an exchange runs exactly once");

        let frame = codec::encode(self.table, op);
        log::trace!("=> {:02x?}", frame.as_bytes());
        for unit in frame.units() {
            self.transport.send_unit(&unit)?;
        }
        self.phase = Phase::Sent;

        self.phase = Phase::AwaitingResponse;
        let mut raw = Vec::with_capacity(codec::response_units(op) * UNIT_LEN);
        for _ in 0..codec::response_units(op) {
            match self.transport.recv_unit(timeout) {
                Ok(unit) => raw.extend_from_slice(&unit),
                Err(Error::Timeout) => {
                    self.phase = Phase::TimedOut;
                    return Err(Error::Timeout);
                }
                Err(e) => return Err(e),
            }
        }
        log::trace!("<= {:02x?}", &raw[..raw.len().min(UNIT_LEN)]);

        match codec::decode(self.table, op, &raw) {
            Ok(payload) => {
                self.phase = Phase::Decoded;
                Ok(payload)
            }
            Err(Error::ChecksumInvalid) => {
                self.phase = Phase::ChecksumInvalid;
                Err(Error::ChecksumInvalid)
            }
            Err(e) => {
                // Structurally decoded, logically rejected
                self.phase = Phase::Decoded;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::QOOB_PRO_V1;
    use std::collections::VecDeque;

    /// Transport fed from a canned script of response units.
    struct Scripted {
        sent: Vec<[u8; UNIT_LEN]>,
        responses: VecDeque<Result<[u8; UNIT_LEN]>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<[u8; UNIT_LEN]>>) -> Self {
            Self {
                sent: Vec::new(),
                responses: responses.into(),
            }
        }
    }

    impl Transport for Scripted {
        fn send_unit(&mut self, unit: &[u8; UNIT_LEN]) -> Result<()> {
            self.sent.push(*unit);
            Ok(())
        }

        fn recv_unit(&mut self, _timeout: Duration) -> Result<[u8; UNIT_LEN]> {
            self.responses.pop_front().unwrap_or(Err(Error::Timeout))
        }
    }

    fn response_unit(status: u8, payload: &[u8]) -> [u8; UNIT_LEN] {
        let mut frame = vec![status];
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        frame.extend_from_slice(payload);
        frame.push((QOOB_PRO_V1.checksum)(&frame));
        let mut unit = [0u8; UNIT_LEN];
        unit[..frame.len()].copy_from_slice(&frame);
        unit
    }

    #[test]
    fn successful_exchange_ends_decoded() {
        let mut t = Scripted::new(vec![Ok(response_unit(0, &[1, 21, 16, 8]))]);
        let mut ex = Exchange::new(&mut t, &QOOB_PRO_V1);
        assert_eq!(ex.phase(), Phase::Idle);
        let payload = ex
            .run(&Operation::Ident, Duration::from_millis(10))
            .unwrap();
        assert_eq!(payload, vec![1, 21, 16, 8]);
        assert_eq!(ex.phase(), Phase::Decoded);
        assert_eq!(t.sent.len(), 1);
    }

    #[test]
    fn timeout_ends_timed_out() {
        let mut t = Scripted::new(vec![Err(Error::Timeout)]);
        let mut ex = Exchange::new(&mut t, &QOOB_PRO_V1);
        let err = ex
            .run(&Operation::Ident, Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err, Error::Timeout);
        assert_eq!(ex.phase(), Phase::TimedOut);
    }

    #[test]
    fn corrupt_response_ends_checksum_invalid() {
        let mut unit = response_unit(0, &[1, 21, 16, 8]);
        unit[3] ^= 0xFF;
        let mut t = Scripted::new(vec![Ok(unit)]);
        let mut ex = Exchange::new(&mut t, &QOOB_PRO_V1);
        let err = ex
            .run(&Operation::Ident, Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err, Error::ChecksumInvalid);
        assert_eq!(ex.phase(), Phase::ChecksumInvalid);
    }

    #[test]
    fn device_rejection_still_counts_as_decoded() {
        let mut t = Scripted::new(vec![Ok(response_unit(0x13, &[0, 0, 0, 0]))]);
        let mut ex = Exchange::new(&mut t, &QOOB_PRO_V1);
        let err = ex
            .run(&Operation::Ident, Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err, Error::Device { status: 0x13 });
        assert_eq!(ex.phase(), Phase::Decoded);
    }

    #[test]
    fn write_command_spans_multiple_units() {
        let page = [0x5Au8; 256];
        let mut t = Scripted::new(vec![Ok(response_unit(0, &[]))]);
        let mut ex = Exchange::new(&mut t, &QOOB_PRO_V1);
        ex.run(
            &Operation::Write {
                addr: 0,
                data: &page,
            },
            Duration::from_millis(10),
        )
        .unwrap();
        assert_eq!(t.sent.len(), 5);
    }
}
