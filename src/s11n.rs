//! s11n == serialization. Types and constants matching the bytes that make up FastCGI records.

use byteorder::{ByteOrder, NetworkEndian};

use std::io;

pub const FASTCGI_VERSION: u8 = 1;

/// Size of every record header, and of the BeginRequest body.
pub const HEADER_LEN: usize = 8;

/// Largest content a single record can carry.
pub const MAX_CONTENT_LEN: usize = 0xFFFF;

/// Request id 0 is reserved for management records.
pub const NULL_REQUEST_ID: u16 = 0;

/// BeginRequest flag asking the backend to keep the connection open after the request.
pub const FCGI_KEEP_CONN: u8 = 1;

enum_from_primitive! {
    #[repr(u8)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum RecordType {
        BeginRequest = 1,
        AbortRequest = 2,
        EndRequest = 3,
        Params = 4,
        Stdin = 5,
        Stdout = 6,
        Stderr = 7,
        Data = 8,
        GetValues = 9,
        GetValuesResult = 10,
        UnknownType = 11,
    }
}

enum_from_primitive! {
    #[repr(u16)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Role {
        Responder = 1,
        Authorizer = 2,
        Filter = 3,
    }
}

/// The fixed 8-byte header in front of every record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub version: u8,
    pub record_type: u8,
    pub request_id: u16,
    pub content_length: u16,
    pub padding_length: u8,
    pub reserved: u8,
}

impl RecordHeader {
    pub fn new(record_type: RecordType, request_id: u16, content_length: u16) -> RecordHeader {
        RecordHeader {
            version: FASTCGI_VERSION,
            record_type: record_type as u8,
            request_id,
            content_length,
            padding_length: 0,
            reserved: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0] = self.version;
        bytes[1] = self.record_type;
        NetworkEndian::write_u16(&mut bytes[2..4], self.request_id);
        NetworkEndian::write_u16(&mut bytes[4..6], self.content_length);
        bytes[6] = self.padding_length;
        bytes[7] = self.reserved;
        bytes
    }

    pub fn decode(bytes: &[u8]) -> io::Result<RecordHeader> {
        if bytes.len() < HEADER_LEN {
            let msg = format!("record header needs {} bytes, got {}", HEADER_LEN, bytes.len());
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, msg));
        }
        Ok(RecordHeader {
            version: bytes[0],
            record_type: bytes[1],
            request_id: NetworkEndian::read_u16(&bytes[2..4]),
            content_length: NetworkEndian::read_u16(&bytes[4..6]),
            padding_length: bytes[6],
            reserved: bytes[7],
        })
    }
}

/// Body of the BeginRequest record: role, flags, 5 reserved bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeginRequestBody {
    pub role: u16,
    pub flags: u8,
}

impl BeginRequestBody {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        NetworkEndian::write_u16(&mut bytes[0..2], self.role);
        bytes[2] = self.flags;
        bytes
    }

    pub fn decode(bytes: &[u8]) -> io::Result<BeginRequestBody> {
        if bytes.len() != HEADER_LEN {
            let msg = format!("BeginRequest body must be {} bytes, got {}", HEADER_LEN, bytes.len());
            return Err(io::Error::new(io::ErrorKind::InvalidData, msg));
        }
        Ok(BeginRequestBody {
            role: NetworkEndian::read_u16(&bytes[0..2]),
            flags: bytes[2],
        })
    }
}
