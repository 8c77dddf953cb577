//! A stand-in for the LED matrix serial link that validates the exact
//! command/payload/swap/ack sequence and fails closed on any deviation.

use std::io::{self, Read, Write};

use super::{CMD_SWAP_BUFFERS, CMD_WRITE_BUFFER, FRAME_ACK, PAYLOAD_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for a command byte.
    ExpectCommand,
    /// Waiting for the rest of the 768-byte payload; the count is how many
    /// bytes have arrived so far.
    ExpectPayload(usize),
    /// Swap requested: the next read answers the ack. A further write
    /// command is also legal here, mirroring the firmware.
    ExpectSwap,
    Closed,
}

/// Mock matrix device. Accepts zero or more repetitions of
/// `[CMD_WRITE_BUFFER][768 bytes][CMD_SWAP_BUFFERS]`, answering `b'F'` to a
/// read after each swap. Any other byte closes the device and all
/// subsequent IO fails.
#[derive(Debug)]
pub struct MockMatrix {
    state: State,
}

impl MockMatrix {
    pub fn new() -> Self {
        Self {
            state: State::ExpectCommand,
        }
    }

    pub fn close(&mut self) {
        self.state = State::Closed;
    }

    fn desync(&mut self, detail: String) -> io::Error {
        self.state = State::Closed;
        io::Error::new(io::ErrorKind::InvalidData, detail)
    }
}

impl Default for MockMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for MockMatrix {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.state {
            State::ExpectSwap => {
                if buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = FRAME_ACK;
                self.state = State::ExpectCommand;
                Ok(1)
            }
            State::Closed => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock matrix is closed",
            )),
            _ => Ok(0),
        }
    }
}

impl Write for MockMatrix {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for (i, &byte) in buf.iter().enumerate() {
            match self.state {
                State::ExpectCommand | State::ExpectSwap => match byte {
                    CMD_WRITE_BUFFER => self.state = State::ExpectPayload(0),
                    CMD_SWAP_BUFFERS if self.state == State::ExpectCommand => {
                        self.state = State::ExpectSwap;
                    }
                    _ => {
                        return Err(self.desync(format!(
                            "unexpected byte 0x{byte:02x} at offset {i} while waiting for a command"
                        )));
                    }
                },
                State::ExpectPayload(count) => {
                    let count = count + 1;
                    self.state = if count == PAYLOAD_LEN {
                        State::ExpectCommand
                    } else {
                        State::ExpectPayload(count)
                    };
                }
                State::Closed => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "mock matrix is closed",
                    ));
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
