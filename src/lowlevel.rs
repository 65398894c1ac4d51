use super::s11n::*;

use byteorder::{ByteOrder, NetworkEndian};
use bytes::{Buf, BufMut, BytesMut};
use enum_primitive::FromPrimitive;
use tokio_util::codec::Decoder;

use std::io;

/// Append one record header to `buf`.
pub fn write_header(buf: &mut BytesMut, record_type: RecordType, request_id: u16, content_length: u16) {
    buf.put_slice(&RecordHeader::new(record_type, request_id, content_length).to_bytes());
}

/// Number of bytes the length prefix for a field of `len` bytes takes up.
pub fn len_prefix_size(len: usize) -> usize {
    if len < 0x80 { 1 } else { 4 }
}

/// Write a name-value length prefix.
///
/// # Panics
///
/// Lengths of 0x8000_0000 and up are not encodable and panic. Params records bound the length to
/// `MAX_CONTENT_LEN` long before that.
pub(crate) fn write_len(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
    } else {
        assert!(len < 0x8000_0000, "un-encodable name-value pair length: {:#x}", len);
        let mut bytes = [0u8; 4];
        NetworkEndian::write_u32(&mut bytes, len as u32 | 0x8000_0000);
        buf.put_slice(&bytes);
    }
}

pub fn read_len(buf: &mut BytesMut) -> io::Result<usize> {
    let first_byte = match buf.first() {
        Some(&byte) => byte,
        None => return Err(truncated("name-value length")),
    };
    if first_byte < 0x80 {
        Ok(buf.get_u8() as usize)
    } else if buf.len() < 4 {
        Err(truncated("4-byte name-value length"))
    } else {
        Ok((buf.get_u32() & 0x7FFF_FFFF) as usize)
    }
}

/// Parameter names travel as Latin-1. Anything outside that range is replaced with `?`.
pub fn latin1_bytes(name: &str) -> Vec<u8> {
    name.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u32 as u8 } else { b'?' })
        .collect()
}

/// Content length of a Params record holding exactly this one pair.
pub fn name_value_len(name: &[u8], value: &[u8]) -> usize {
    len_prefix_size(name.len()) + len_prefix_size(value.len()) + name.len() + value.len()
}

/// Write one complete Params record holding a single name-value pair. The caller has already
/// checked that the pair fits into one record.
pub fn write_name_value_record(buf: &mut BytesMut, request_id: u16, name: &[u8], value: &[u8]) {
    let content_length = name_value_len(name, value);
    debug_assert!(content_length <= MAX_CONTENT_LEN);
    buf.reserve(HEADER_LEN + content_length);
    write_header(buf, RecordType::Params, request_id, content_length as u16);
    write_len(buf, name.len());
    write_len(buf, value.len());
    buf.put_slice(name);
    buf.put_slice(value);
}

fn truncated(what: &str) -> io::Error {
    let msg = format!("truncated {}", what);
    error!("{}", msg);
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// A decoded record from the request side of the protocol.
#[derive(Debug)]
pub struct FastcgiRecord {
    pub request_id: u16,
    pub body: FastcgiRecordBody,
}

#[derive(Debug)]
pub enum FastcgiRecordBody {
    BeginRequest(BeginRequest),
    AbortRequest,
    Params(Vec<(BytesMut, BytesMut)>),
    Stdin(BytesMut),
    Data(BytesMut),
    UnknownType(u8, BytesMut),
}

#[derive(Debug, PartialEq, Eq)]
pub struct BeginRequest {
    pub role: Role,
    pub keep_connection: bool,
}

/// Decodes the record stream a FastCGI client sends, i.e. what `FastcgiRequest` produces. Used to
/// inspect traffic and to stand in for a backend.
#[derive(Debug, Default)]
pub struct FastcgiRecordDecoder;

fn read_params(buf: &mut BytesMut) -> io::Result<Vec<(BytesMut, BytesMut)>> {
    let mut params = vec![];
    while !buf.is_empty() {
        let name_len = read_len(buf)?;
        let value_len = read_len(buf)?;
        if buf.len() < name_len + value_len {
            return Err(truncated("name-value pair"));
        }
        let name = buf.split_to(name_len);
        let value = buf.split_to(value_len);
        trace!("param ({}, {})",
               String::from_utf8_lossy(&name),
               String::from_utf8_lossy(&value));
        params.push((name, value));
    }
    Ok(params)
}

fn read_begin_request_body(buf: &[u8]) -> io::Result<BeginRequest> {
    let raw = BeginRequestBody::decode(buf)?;
    let role = match Role::from_u16(raw.role) {
        Some(role) => role,
        None => {
            let msg = format!("unknown role {}", raw.role);
            error!("{}", msg);
            return Err(io::Error::new(io::ErrorKind::InvalidData, msg));
        }
    };
    Ok(BeginRequest {
        role,
        keep_connection: (raw.flags & FCGI_KEEP_CONN) == FCGI_KEEP_CONN,
    })
}

impl Decoder for FastcgiRecordDecoder {
    type Item = FastcgiRecord;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let header = RecordHeader::decode(&buf[..HEADER_LEN])?;
        if header.version != FASTCGI_VERSION {
            let msg = format!("unexpected FCGI version {}", header.version);
            error!("{}", msg);
            return Err(io::Error::new(io::ErrorKind::InvalidData, msg));
        }

        let content_len = header.content_length as usize;
        let record_len = HEADER_LEN + content_len + header.padding_length as usize;
        if buf.len() < record_len {
            buf.reserve(record_len - buf.len());
            return Ok(None);
        }

        buf.advance(HEADER_LEN);
        let mut content = buf.split_to(content_len);
        buf.advance(header.padding_length as usize);

        let request_id = header.request_id;
        debug!("request id: {}; record type: {}, {} bytes of content",
               request_id, header.record_type, content_len);

        let body = match RecordType::from_u8(header.record_type) {
            Some(RecordType::BeginRequest) => {
                FastcgiRecordBody::BeginRequest(read_begin_request_body(&content)?)
            },
            Some(RecordType::AbortRequest) => FastcgiRecordBody::AbortRequest,
            Some(RecordType::Params) => FastcgiRecordBody::Params(read_params(&mut content)?),
            Some(RecordType::Stdin) => FastcgiRecordBody::Stdin(content),
            Some(RecordType::Data) => FastcgiRecordBody::Data(content),
            Some(other) => {
                let msg = format!("illegal record type {:?} from FastCGI client", other);
                error!("{}", msg);
                return Err(io::Error::new(io::ErrorKind::InvalidData, msg));
            },
            None => {
                warn!("unknown record type {}", header.record_type);
                FastcgiRecordBody::UnknownType(header.record_type, content)
            },
        };

        Ok(Some(FastcgiRecord { request_id, body }))
    }
}
