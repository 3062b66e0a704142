//! SMPP wire layer.
//!
//! Only the handful of PDUs the stress session exchanges are modelled:
//! `bind_receiver`, `deliver_sm`, `unbind` and their responses. Every PDU is a
//! 16-byte big-endian header followed by a command-specific body.

use std::fmt;

pub mod codec;
pub mod frame_reader;
pub mod random;

pub use codec::PduCursor;
pub use frame_reader::FrameReader;

/// Size of the fixed PDU header in bytes
pub const HEADER_LEN: usize = 16;

/// Size of the leading `command_length` field
pub const LENGTH_FIELD_LEN: usize = 4;

/// Maximum lengths of C-octet string fields, excluding the NUL terminator
pub mod limits {
    pub const SYSTEM_ID: usize = 15;
    pub const PASSWORD: usize = 8;
    pub const SYSTEM_TYPE: usize = 12;
    pub const ADDRESS_RANGE: usize = 40;
    pub const SERVICE_TYPE: usize = 5;
    pub const ADDRESS: usize = 20;
    pub const TIME: usize = 16;
    pub const MESSAGE_ID: usize = 64;
    /// Largest `short_message` payload
    pub const SHORT_MESSAGE: usize = 160;
}

/// Command identifiers understood by the stress session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandId {
    BindReceiver = 0x0000_0001,
    BindReceiverResp = 0x8000_0001,
    DeliverSm = 0x0000_0005,
    DeliverSmResp = 0x8000_0005,
    Unbind = 0x0000_0006,
    UnbindResp = 0x8000_0006,
}

impl CommandId {
    /// Map a raw wire value onto a known command
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x0000_0001 => Some(CommandId::BindReceiver),
            0x8000_0001 => Some(CommandId::BindReceiverResp),
            0x0000_0005 => Some(CommandId::DeliverSm),
            0x8000_0005 => Some(CommandId::DeliverSmResp),
            0x0000_0006 => Some(CommandId::Unbind),
            0x8000_0006 => Some(CommandId::UnbindResp),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandId::BindReceiver => "bind_receiver",
            CommandId::BindReceiverResp => "bind_receiver_resp",
            CommandId::DeliverSm => "deliver_sm",
            CommandId::DeliverSmResp => "deliver_sm_resp",
            CommandId::Unbind => "unbind",
            CommandId::UnbindResp => "unbind_resp",
        };
        f.write_str(name)
    }
}

/// The 16-byte header shared by every PDU
///
/// `command_id` is kept raw so that unknown commands can still be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub command_id: u32,
    pub status: u32,
    pub sequence_number: u32,
}

impl FrameHeader {
    /// Header for a PDU about to be encoded; `length` is filled in by the encoder.
    pub fn new(command: CommandId, sequence_number: u32) -> Self {
        Self {
            length: 0,
            command_id: command.as_u32(),
            status: 0,
            sequence_number,
        }
    }

    pub fn command(&self) -> Option<CommandId> {
        CommandId::from_u32(self.command_id)
    }
}

/// `bind_receiver` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindReceiver {
    pub header: FrameHeader,
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub interface_version: u8,
    pub addr_ton: u8,
    pub addr_npi: u8,
    pub address_range: String,
}

/// `bind_receiver_resp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindReceiverResp {
    pub header: FrameHeader,
    pub system_id: String,
}

/// `deliver_sm` request
///
/// `sm_length` is not stored; it is always the length of `short_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverSm {
    pub header: FrameHeader,
    pub service_type: String,
    pub source_ton: u8,
    pub source_npi: u8,
    pub source_addr: String,
    pub dest_ton: u8,
    pub dest_npi: u8,
    pub dest_addr: String,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority: u8,
    pub delivery_time: String,
    pub expiry_time: String,
    pub registered: u8,
    pub replace_if_present: u8,
    pub data_coding: u8,
    pub default_msg_id: u8,
    pub short_message: Vec<u8>,
}

impl DeliverSm {
    pub fn sm_length(&self) -> usize {
        self.short_message.len().min(limits::SHORT_MESSAGE)
    }
}
