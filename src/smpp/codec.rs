//! Binary encoding and decoding of the supported PDUs.
//!
//! Decoders take a buffer holding exactly one frame (as produced by
//! [`FrameReader`](super::FrameReader)) and walk it with a [`PduCursor`], so
//! every field access is bounds-checked. Encoders append to a `BytesMut`,
//! reserving the `command_length` slot up front and patching it with the final
//! size once the body is written.
//!
//! C-octet strings are truncated to their maximum on encode and rejected on
//! decode when they are longer than allowed.

use bytes::{BufMut, Bytes, BytesMut};

use super::{
    limits, BindReceiver, BindReceiverResp, CommandId, DeliverSm, FrameHeader, HEADER_LEN,
};
use crate::error::DecodeError;

/// Bounds-checked reader over one PDU
#[derive(Debug)]
pub struct PduCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PduCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let bytes = self.read_raw(1)?;
        Ok(bytes[0])
    }

    /// Read a big-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_raw(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read `n` raw bytes
    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a NUL-terminated string of at most `max` bytes before the NUL
    pub fn read_c_string(
        &mut self,
        field: &'static str,
        max: usize,
    ) -> Result<String, DecodeError> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::MissingTerminator { field })?;
        if nul > max {
            return Err(DecodeError::FieldTooLong {
                field,
                max,
                actual: nul,
            });
        }
        let text = std::str::from_utf8(&rest[..nul])
            .map_err(|_| DecodeError::InvalidText { field })?
            .to_owned();
        self.pos += nul + 1;
        Ok(text)
    }

    /// Read the 16-byte header and check it against the buffer length
    pub fn read_header(&mut self) -> Result<FrameHeader, DecodeError> {
        let header = FrameHeader {
            length: self.read_u32()?,
            command_id: self.read_u32()?,
            status: self.read_u32()?,
            sequence_number: self.read_u32()?,
        };
        if (header.length as usize) < HEADER_LEN {
            return Err(DecodeError::FrameTooShort(header.length));
        }
        if header.length as usize != self.buf.len() {
            return Err(DecodeError::LengthMismatch {
                declared: header.length,
                actual: self.buf.len(),
            });
        }
        Ok(header)
    }
}

/// Parse just the header of a frame
///
/// Frames shorter than the header report `FrameTooShort` with whatever length
/// the first word declares.
pub fn decode_header(buf: &[u8]) -> Result<FrameHeader, DecodeError> {
    if buf.len() < HEADER_LEN {
        let declared = match buf.get(..4) {
            Some(word) => u32::from_be_bytes([word[0], word[1], word[2], word[3]]),
            None => buf.len() as u32,
        };
        return Err(DecodeError::FrameTooShort(declared));
    }
    PduCursor::new(buf).read_header()
}

fn expect_command(header: &FrameHeader, expected: CommandId) -> Result<(), DecodeError> {
    if header.command_id != expected.as_u32() {
        return Err(DecodeError::UnexpectedCommand {
            expected: expected.as_u32(),
            actual: header.command_id,
        });
    }
    Ok(())
}

fn header_cursor(
    buf: &[u8],
    expected: CommandId,
) -> Result<(FrameHeader, PduCursor<'_>), DecodeError> {
    let header = decode_header(buf)?;
    expect_command(&header, expected)?;
    let mut cursor = PduCursor::new(buf);
    cursor.read_raw(HEADER_LEN)?;
    Ok((header, cursor))
}

pub fn decode_bind_receiver(buf: &[u8]) -> Result<BindReceiver, DecodeError> {
    let (header, mut cur) = header_cursor(buf, CommandId::BindReceiver)?;
    Ok(BindReceiver {
        header,
        system_id: cur.read_c_string("system_id", limits::SYSTEM_ID)?,
        password: cur.read_c_string("password", limits::PASSWORD)?,
        system_type: cur.read_c_string("system_type", limits::SYSTEM_TYPE)?,
        interface_version: cur.read_u8()?,
        addr_ton: cur.read_u8()?,
        addr_npi: cur.read_u8()?,
        address_range: cur.read_c_string("address_range", limits::ADDRESS_RANGE)?,
    })
}

/// Decode a `bind_receiver_resp`
///
/// A rejected bind may carry no body at all; the system id is then empty.
pub fn decode_bind_receiver_resp(buf: &[u8]) -> Result<BindReceiverResp, DecodeError> {
    let (header, mut cur) = header_cursor(buf, CommandId::BindReceiverResp)?;
    let system_id = if cur.remaining() == 0 && header.status != 0 {
        String::new()
    } else {
        cur.read_c_string("system_id", limits::SYSTEM_ID)?
    };
    Ok(BindReceiverResp { header, system_id })
}

/// Decode a `deliver_sm`; an `sm_length` above 160 is rejected
pub fn decode_deliver_sm(buf: &[u8]) -> Result<DeliverSm, DecodeError> {
    let (header, mut cur) = header_cursor(buf, CommandId::DeliverSm)?;
    let service_type = cur.read_c_string("service_type", limits::SERVICE_TYPE)?;
    let source_ton = cur.read_u8()?;
    let source_npi = cur.read_u8()?;
    let source_addr = cur.read_c_string("source_addr", limits::ADDRESS)?;
    let dest_ton = cur.read_u8()?;
    let dest_npi = cur.read_u8()?;
    let dest_addr = cur.read_c_string("destination_addr", limits::ADDRESS)?;
    let esm_class = cur.read_u8()?;
    let protocol_id = cur.read_u8()?;
    let priority = cur.read_u8()?;
    let delivery_time = cur.read_c_string("schedule_delivery_time", limits::TIME)?;
    let expiry_time = cur.read_c_string("validity_period", limits::TIME)?;
    let registered = cur.read_u8()?;
    let replace_if_present = cur.read_u8()?;
    let data_coding = cur.read_u8()?;
    let default_msg_id = cur.read_u8()?;
    let sm_length = cur.read_u8()? as usize;
    if sm_length > limits::SHORT_MESSAGE {
        return Err(DecodeError::FieldTooLong {
            field: "short_message",
            max: limits::SHORT_MESSAGE,
            actual: sm_length,
        });
    }
    let short_message = cur.read_raw(sm_length)?.to_vec();

    Ok(DeliverSm {
        header,
        service_type,
        source_ton,
        source_npi,
        source_addr,
        dest_ton,
        dest_npi,
        dest_addr,
        esm_class,
        protocol_id,
        priority,
        delivery_time,
        expiry_time,
        registered,
        replace_if_present,
        data_coding,
        default_msg_id,
        short_message,
    })
}

/// Decode a header-only `unbind`
pub fn decode_unbind(buf: &[u8]) -> Result<FrameHeader, DecodeError> {
    header_cursor(buf, CommandId::Unbind).map(|(header, _)| header)
}

/// Decode a header-only `unbind_resp`
pub fn decode_unbind_resp(buf: &[u8]) -> Result<FrameHeader, DecodeError> {
    header_cursor(buf, CommandId::UnbindResp).map(|(header, _)| header)
}

fn put_header(out: &mut BytesMut, header: &FrameHeader) -> usize {
    let start = out.len();
    // command_length is patched in by finish_frame
    out.put_u32(0);
    out.put_u32(header.command_id);
    out.put_u32(header.status);
    out.put_u32(header.sequence_number);
    start
}

fn finish_frame(out: &mut BytesMut, start: usize) {
    let len = (out.len() - start) as u32;
    out[start..start + 4].copy_from_slice(&len.to_be_bytes());
}

fn put_c_string(out: &mut BytesMut, value: &str, max: usize) {
    let bytes = value.as_bytes();
    out.put_slice(&bytes[..bytes.len().min(max)]);
    out.put_u8(0);
}

pub fn encode_bind_receiver_into(bind: &BindReceiver, out: &mut BytesMut) {
    let start = put_header(out, &bind.header);
    put_c_string(out, &bind.system_id, limits::SYSTEM_ID);
    put_c_string(out, &bind.password, limits::PASSWORD);
    put_c_string(out, &bind.system_type, limits::SYSTEM_TYPE);
    out.put_u8(bind.interface_version);
    out.put_u8(bind.addr_ton);
    out.put_u8(bind.addr_npi);
    put_c_string(out, &bind.address_range, limits::ADDRESS_RANGE);
    finish_frame(out, start);
}

pub fn encode_bind_receiver(bind: &BindReceiver) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN + 80);
    encode_bind_receiver_into(bind, &mut out);
    out.freeze()
}

/// Encode a `bind_receiver_resp`; its length is `16 + len(system_id) + 1`.
pub fn encode_bind_receiver_resp(resp: &BindReceiverResp) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN + limits::SYSTEM_ID + 1);
    let start = put_header(&mut out, &resp.header);
    put_c_string(&mut out, &resp.system_id, limits::SYSTEM_ID);
    finish_frame(&mut out, start);
    out.freeze()
}

/// Append a `deliver_sm` to `out`
///
/// With empty service type and times, 12-digit addresses and a 1-byte message,
/// the frame is `57 + sm_length` bytes long.
pub fn encode_deliver_sm_into(pdu: &DeliverSm, out: &mut BytesMut) {
    let sm_length = pdu.sm_length();
    out.reserve(HEADER_LEN + 96 + sm_length);

    let start = put_header(out, &pdu.header);
    put_c_string(out, &pdu.service_type, limits::SERVICE_TYPE);
    out.put_u8(pdu.source_ton);
    out.put_u8(pdu.source_npi);
    put_c_string(out, &pdu.source_addr, limits::ADDRESS);
    out.put_u8(pdu.dest_ton);
    out.put_u8(pdu.dest_npi);
    put_c_string(out, &pdu.dest_addr, limits::ADDRESS);
    out.put_u8(pdu.esm_class);
    out.put_u8(pdu.protocol_id);
    out.put_u8(pdu.priority);
    put_c_string(out, &pdu.delivery_time, limits::TIME);
    put_c_string(out, &pdu.expiry_time, limits::TIME);
    out.put_u8(pdu.registered);
    out.put_u8(pdu.replace_if_present);
    out.put_u8(pdu.data_coding);
    out.put_u8(pdu.default_msg_id);
    out.put_u8(sm_length as u8);
    out.put_slice(&pdu.short_message[..sm_length]);
    finish_frame(out, start);
}

pub fn encode_deliver_sm(pdu: &DeliverSm) -> Bytes {
    let mut out = BytesMut::new();
    encode_deliver_sm_into(pdu, &mut out);
    out.freeze()
}

/// Encode a `deliver_sm_resp` with an empty message id
pub fn encode_deliver_sm_resp(sequence_number: u32, status: u32) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN + 1);
    let header = FrameHeader {
        status,
        ..FrameHeader::new(CommandId::DeliverSmResp, sequence_number)
    };
    let start = put_header(&mut out, &header);
    put_c_string(&mut out, "", limits::MESSAGE_ID);
    finish_frame(&mut out, start);
    out.freeze()
}

fn encode_header_only(command: CommandId, sequence_number: u32) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN);
    let start = put_header(&mut out, &FrameHeader::new(command, sequence_number));
    finish_frame(&mut out, start);
    out.freeze()
}

pub fn encode_unbind(sequence_number: u32) -> Bytes {
    encode_header_only(CommandId::Unbind, sequence_number)
}

pub fn encode_unbind_resp(sequence_number: u32) -> Bytes {
    encode_header_only(CommandId::UnbindResp, sequence_number)
}
