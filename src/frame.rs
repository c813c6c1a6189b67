//! Modbus RTU frame construction and validation.
//!
//! The RK6006 speaks a two-function subset of Modbus RTU: read holding
//! registers (`0x03`) and write single register (`0x06`). Requests are
//! always 8 bytes; read responses carry a byte-count field and a payload of
//! big-endian 16-bit words; write responses echo the request verbatim.
//! Every frame ends with a little-endian CRC-16.

use crate::error::FrameError;

/// Read holding registers.
pub const FUNC_READ_HOLDING: u8 = 0x03;
/// Write single register.
pub const FUNC_WRITE_SINGLE: u8 = 0x06;

/// Shortest response worth classifying: slave id, function, one more byte,
/// and the two CRC bytes.
pub const MIN_RESPONSE_LEN: usize = 5;

/// Length of the echoed write response.
pub const WRITE_ECHO_LEN: usize = 8;

/// Modbus CRC-16: polynomial `0xA001`, initial value `0xFFFF`, processed
/// LSB-first one byte at a time.
pub fn compute_crc(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

fn build_frame(slave_id: u8, function: u8, register: u16, value: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8);
    frame.push(slave_id);
    frame.push(function);
    frame.extend_from_slice(&register.to_be_bytes());
    frame.extend_from_slice(&value.to_be_bytes());
    let crc = compute_crc(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Build a read-holding-registers request for `count` registers starting at
/// `register`.
pub fn build_read(slave_id: u8, register: u16, count: u16) -> Vec<u8> {
    build_frame(slave_id, FUNC_READ_HOLDING, register, count)
}

/// Build a write-single-register request.
pub fn build_write(slave_id: u8, register: u16, value: u16) -> Vec<u8> {
    build_frame(slave_id, FUNC_WRITE_SINGLE, register, value)
}

/// Validate a read response and decode `expected_count` big-endian words.
pub fn parse_read_response(response: &[u8], expected_count: usize) -> Result<Vec<u16>, FrameError> {
    let data_len = expected_count * 2;
    if response.len() < 3 + data_len + 2 {
        return Err(FrameError::TooShort);
    }
    if response[1] != FUNC_READ_HOLDING {
        return Err(FrameError::UnexpectedFunction(response[1]));
    }
    if response[2] as usize != data_len {
        return Err(FrameError::ByteCountMismatch {
            expected: data_len as u8,
            got: response[2],
        });
    }
    let crc_offset = response.len() - 2;
    let computed = compute_crc(&response[..crc_offset]);
    let received = u16::from_le_bytes([response[crc_offset], response[crc_offset + 1]]);
    if computed != received {
        return Err(FrameError::CrcMismatch { computed, received });
    }
    let words = response[3..3 + data_len]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Ok(words)
}

/// Validate a write response.
///
/// The device answers a write by echoing the request, so validity is judged
/// on length alone; the CRC is not re-verified against the echoed content.
pub fn parse_write_response(response: &[u8]) -> Result<(), FrameError> {
    if response.len() < WRITE_ECHO_LEN {
        return Err(FrameError::TooShort);
    }
    Ok(())
}
