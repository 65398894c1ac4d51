use super::config::FastcgiClientConfig;
use super::connection::BackendChannel;
use super::error::{Error, Result};
use super::lowlevel::*;
use super::s11n::*;

use bytes::{BufMut, Bytes, BytesMut};

use std::cmp;

/// One FastCGI request on its way to a backend: BeginRequest, then Params records, then the body
/// on Stdin. Records accumulate in an internal buffer which is handed to the connection, together
/// with the body, by a single `send`.
#[derive(Debug)]
pub struct FastcgiRequest {
    request_id: u16,
    server_software: String,
    // `None` once the records have been handed to the connection.
    buffer: Option<BytesMut>,
}

impl FastcgiRequest {
    pub fn new(request_id: u16, config: &FastcgiClientConfig) -> FastcgiRequest {
        let mut buffer = BytesMut::with_capacity(cmp::max(config.buffer_capacity, 2 * HEADER_LEN));
        write_header(&mut buffer, RecordType::BeginRequest, request_id, HEADER_LEN as u16);
        let body = BeginRequestBody {
            role: Role::Responder as u16,
            flags: if config.keep_connection { FCGI_KEEP_CONN } else { 0 },
        };
        buffer.put_slice(&body.to_bytes());
        debug!("request {}: BeginRequest written", request_id);

        FastcgiRequest {
            request_id,
            server_software: config.server_software.clone(),
            buffer: Some(buffer),
        }
    }

    pub fn request_id(&self) -> u16 {
        self.request_id
    }

    pub fn server_software(&self) -> &str {
        &self.server_software
    }

    pub fn is_sent(&self) -> bool {
        self.buffer.is_none()
    }

    /// Add one CGI parameter in its own Params record. An absent value leaves the parameter out
    /// entirely.
    pub fn add_header<V>(&mut self, name: &str, value: Option<V>) -> Result<()>
        where V: AsRef<[u8]>
    {
        let request_id = self.request_id;
        let buffer = self.buffer.as_mut().ok_or(Error::AlreadySent)?;
        let value = match value {
            Some(value) => value,
            None => return Ok(()),
        };

        let name_bytes = latin1_bytes(name);
        let value_bytes = value.as_ref();
        let len = name_value_len(&name_bytes, value_bytes);
        if len > MAX_CONTENT_LEN {
            error!("request {}: parameter {} needs {} bytes, more than one record holds",
                   request_id, name, len);
            return Err(Error::ParamTooLong { name: name.to_owned(), len });
        }

        trace!("request {}: param {} ({} bytes)", request_id, name, value_bytes.len());
        write_name_value_record(buffer, request_id, &name_bytes, value_bytes);
        Ok(())
    }

    /// Terminate the params, queue everything plus the optional body on `channel`, and flush it
    /// once. The body is released here if it never reaches the channel.
    pub fn send<C>(&mut self, body: Option<Bytes>, channel: &mut C) -> Result<()>
        where C: BackendChannel + ?Sized
    {
        let body = PendingBody::new(body);

        if !channel.has_handler() {
            error!("request {}: no handler attached to the FastCGI connection", self.request_id);
            return Err(Error::InvalidConnectionState);
        }

        let mut buffer = match self.buffer.take() {
            Some(buffer) => buffer,
            None => {
                warn!("request {}: send called again after the request was sent", self.request_id);
                return Err(Error::AlreadySent);
            }
        };

        write_header(&mut buffer, RecordType::Params, self.request_id, 0);
        match body.len() {
            Some(len) if len > 0 => {
                let first_chunk = cmp::min(len, MAX_CONTENT_LEN);
                write_header(&mut buffer, RecordType::Stdin, self.request_id, first_chunk as u16);
            },
            _ => (),
        }

        debug!("request {}: queueing {} bytes of records", self.request_id, buffer.len());
        channel.write(buffer.freeze())?;

        if let Some(mut rest) = body.hand_off() {
            debug!("request {}: queueing body of {} bytes", self.request_id, rest.len());
            let mut first = true;
            while !rest.is_empty() {
                let chunk = rest.split_to(cmp::min(rest.len(), MAX_CONTENT_LEN));
                if !first {
                    channel.write(self.header_bytes(RecordType::Stdin, chunk.len() as u16))?;
                }
                channel.write(chunk)?;
                first = false;
            }
            channel.write(self.header_bytes(RecordType::Stdin, 0))?;
        }

        channel.flush()?;
        Ok(())
    }

    /// Run `f`, dropping every parameter it added if it fails, so a request never goes out with
    /// half an environment.
    pub(crate) fn all_or_nothing<F>(&mut self, f: F) -> Result<()>
        where F: FnOnce(&mut FastcgiRequest) -> Result<()>
    {
        let mark = self.buffer.as_ref().map(BytesMut::len);
        let result = f(self);
        if result.is_err() {
            if let (Some(buffer), Some(mark)) = (self.buffer.as_mut(), mark) {
                buffer.truncate(mark);
            }
        }
        result
    }

    fn header_bytes(&self, record_type: RecordType, content_length: u16) -> Bytes {
        let header = RecordHeader::new(record_type, self.request_id, content_length);
        Bytes::copy_from_slice(&header.to_bytes())
    }

    #[cfg(test)]
    pub(crate) fn pending_bytes(&self) -> Option<&[u8]> {
        self.buffer.as_ref().map(|buf| &buf[..])
    }
}

/// A request body not yet owned by the connection. Dropping it releases the body.
struct PendingBody {
    body: Option<Bytes>,
}

impl PendingBody {
    fn new(body: Option<Bytes>) -> PendingBody {
        PendingBody { body }
    }

    fn len(&self) -> Option<usize> {
        self.body.as_ref().map(Bytes::len)
    }

    fn hand_off(mut self) -> Option<Bytes> {
        self.body.take()
    }
}

impl Drop for PendingBody {
    fn drop(&mut self) {
        if let Some(body) = self.body.take() {
            debug!("releasing unsent request body of {} bytes", body.len());
        }
    }
}
