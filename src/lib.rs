#[macro_use] extern crate enum_primitive;
#[macro_use] extern crate log;

mod config;
mod connection;
mod environment;
mod error;
mod lowlevel;
mod request;
mod s11n;

pub use config::FastcgiClientConfig;
pub use connection::{BackendChannel, ConnectionWriter, FastcgiConnection};
pub use environment::{cgi_header_name, query_string, server_protocol};
pub use environment::{ClientAddrs, DocumentRoots, StaticRoots};
pub use error::{Error, Result};
pub use lowlevel::{FastcgiRecordDecoder, FastcgiRecord, FastcgiRecordBody, BeginRequest};
pub use lowlevel::{read_len, write_header};
pub use request::FastcgiRequest;
pub use s11n::{FASTCGI_VERSION, HEADER_LEN, MAX_CONTENT_LEN, RecordHeader, RecordType, Role};
