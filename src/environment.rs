//! Builds the CGI/1.1 environment for a request out of the HTTP request and the client
//! connection it arrived on.

use super::error::{Error, Result};
use super::request::FastcgiRequest;

use bytes::Bytes;
use http::header::CONTENT_TYPE;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Resolves the document root a script file lives under.
pub trait DocumentRoots {
    fn root_of(&self, file: &Path) -> Option<PathBuf>;
}

/// A fixed list of document roots. The deepest root containing the file wins.
#[derive(Clone, Debug, Default)]
pub struct StaticRoots {
    roots: Vec<PathBuf>,
}

impl StaticRoots {
    pub fn new<I, P>(roots: I) -> StaticRoots
        where I: IntoIterator<Item = P>,
              P: Into<PathBuf>
    {
        StaticRoots {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }
}

impl DocumentRoots for StaticRoots {
    fn root_of(&self, file: &Path) -> Option<PathBuf> {
        self.roots
            .iter()
            .filter(|root| file.starts_with(root))
            .max_by_key(|root| root.components().count())
            .cloned()
    }
}

/// The two ends of the client connection a request came in on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientAddrs {
    pub remote: SocketAddr,
    pub local: SocketAddr,
}

impl ClientAddrs {
    pub fn new(remote: SocketAddr, local: SocketAddr) -> ClientAddrs {
        ClientAddrs { remote, local }
    }

    pub fn from_stream(stream: &tokio::net::TcpStream) -> std::io::Result<ClientAddrs> {
        Ok(ClientAddrs {
            remote: stream.peer_addr()?,
            local: stream.local_addr()?,
        })
    }
}

/// HTTP header name to its CGI variable: `user-agent` becomes `HTTP_USER_AGENT`.
pub fn cgi_header_name(header: &str) -> String {
    let mut name = String::with_capacity(5 + header.len());
    name.push_str("HTTP_");
    name.extend(header.chars().map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() }));
    name
}

/// Everything after the first `?`, or nothing.
pub fn query_string(uri: &str) -> &str {
    match uri.find('?') {
        Some(idx) => &uri[idx + 1..],
        None => "",
    }
}

pub fn server_protocol(version: http::Version) -> &'static str {
    match version {
        http::Version::HTTP_09 => "HTTP/0.9",
        http::Version::HTTP_10 => "HTTP/1.0",
        http::Version::HTTP_11 => "HTTP/1.1",
        http::Version::HTTP_2 => "HTTP/2.0",
        http::Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/Unknown",
    }
}

impl FastcgiRequest {
    /// DOCUMENT_ROOT, SCRIPT_FILENAME and SCRIPT_NAME for the script `file`, requested as
    /// `canonical_request_path`.
    pub fn write_file_headers<R>(&mut self, file: &Path, roots: &R, canonical_request_path: &str)
        -> Result<()>
        where R: DocumentRoots + ?Sized
    {
        let root = match roots.root_of(file) {
            Some(root) => root,
            None => {
                error!("no document root contains {:?}", file);
                return Err(Error::UnresolvedScriptRoot(file.to_owned()));
            }
        };
        self.all_or_nothing(|fcgi| {
            fcgi.add_header("DOCUMENT_ROOT", Some(&*root.to_string_lossy()))?;
            fcgi.add_header("SCRIPT_FILENAME", Some(&*file.to_string_lossy()))?;
            fcgi.add_header("SCRIPT_NAME", Some(canonical_request_path))
        })
    }

    /// The request line, endpoints, fixed CGI metadata, and one HTTP_* variable per header.
    /// On error none of these parameters are kept.
    pub fn write_headers(&mut self, request: &http::Request<Bytes>, client: &ClientAddrs)
        -> Result<()>
    {
        self.all_or_nothing(|fcgi| fcgi.write_request_params(request, client))
    }

    fn write_request_params(&mut self, request: &http::Request<Bytes>, client: &ClientAddrs)
        -> Result<()>
    {
        let uri = request.uri().to_string();
        self.add_header("REQUEST_URI", Some(uri.as_str()))?;
        self.add_header("REQUEST_METHOD", Some(request.method().as_str()))?;

        self.add_header("REMOTE_ADDR", Some(client.remote.ip().to_string()))?;
        self.add_header("REMOTE_PORT", Some(client.remote.port().to_string()))?;

        let server_software = self.server_software().to_owned();
        self.add_header("SERVER_SOFTWARE", Some(server_software.as_str()))?;
        self.add_header("SERVER_NAME", Some(server_software.as_str()))?;

        self.add_header("SERVER_ADDR", Some(client.local.ip().to_string()))?;
        self.add_header("SERVER_PORT", Some(client.local.port().to_string()))?;

        self.add_header("GATEWAY_INTERFACE", Some("CGI/1.1"))?;
        self.add_header("SERVER_PROTOCOL", Some(server_protocol(request.version())))?;
        self.add_header("CONTENT_TYPE", request.headers().get(CONTENT_TYPE))?;

        // PHP built with --enable-force-cgi-redirect refuses to run without it.
        self.add_header("REDIRECT_STATUS", Some("200"))?;

        self.add_header("QUERY_STRING", Some(query_string(&uri)))?;
        self.add_header("CONTENT_LENGTH", Some(request.body().len().to_string()))?;

        for (name, value) in request.headers() {
            self.add_header(&cgi_header_name(name.as_str()), Some(value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FastcgiClientConfig;
    use crate::lowlevel::{FastcgiRecordBody, FastcgiRecordDecoder};

    use bytes::BytesMut;
    use tokio_util::codec::Decoder;

    fn params_of(request: FastcgiRequest) -> Vec<(String, String)> {
        let mut buf = BytesMut::from(&request.pending_bytes().unwrap()[..]);
        let mut params = vec![];
        while let Some(record) = FastcgiRecordDecoder.decode(&mut buf).unwrap() {
            if let FastcgiRecordBody::Params(pairs) = record.body {
                for (name, value) in pairs {
                    params.push((String::from_utf8(name.to_vec()).unwrap(),
                                 String::from_utf8(value.to_vec()).unwrap()));
                }
            }
        }
        params
    }

    fn get<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
        params.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    fn client() -> ClientAddrs {
        ClientAddrs::new("192.0.2.7:51234".parse().unwrap(), "[::1]:8080".parse().unwrap())
    }

    #[test]
    fn header_names() {
        assert_eq!(cgi_header_name("host"), "HTTP_HOST");
        assert_eq!(cgi_header_name("x-forwarded-for"), "HTTP_X_FORWARDED_FOR");
    }

    #[test]
    fn query_strings() {
        assert_eq!(query_string("/index.php?x=1"), "x=1");
        assert_eq!(query_string("/a?b?c"), "b?c");
        assert_eq!(query_string("/index.php"), "");
        assert_eq!(query_string("/index.php?"), "");
    }

    #[test]
    fn protocol_names() {
        assert_eq!(server_protocol(http::Version::HTTP_09), "HTTP/0.9");
        assert_eq!(server_protocol(http::Version::HTTP_10), "HTTP/1.0");
        assert_eq!(server_protocol(http::Version::HTTP_11), "HTTP/1.1");
        assert_eq!(server_protocol(http::Version::HTTP_2), "HTTP/2.0");
        assert_eq!(server_protocol(http::Version::HTTP_3), "HTTP/3.0");

        let request = http::Request::get("/")
            .version(http::Version::HTTP_10)
            .body(Bytes::new())
            .unwrap();
        let mut fcgi = FastcgiRequest::new(1, &FastcgiClientConfig::default());
        fcgi.write_headers(&request, &client()).unwrap();
        assert_eq!(get(&params_of(fcgi), "SERVER_PROTOCOL"), Some("HTTP/1.0"));
    }

    #[test]
    fn oversized_header_drops_whole_environment() {
        let huge = http::HeaderValue::from_bytes(&vec![b'c'; 70_000]).unwrap();
        let request = http::Request::get("/index.php")
            .header("cookie", huge)
            .body(Bytes::new())
            .unwrap();
        let mut fcgi = FastcgiRequest::new(1, &FastcgiClientConfig::default());
        match fcgi.write_headers(&request, &client()) {
            Err(Error::ParamTooLong { name, .. }) => assert_eq!(name, "HTTP_COOKIE"),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(params_of(fcgi).is_empty());
    }

    #[test]
    fn get_request_environment() {
        let config = FastcgiClientConfig::new().server_software("test-server");
        let request = http::Request::get("/index.php?x=1")
            .header("Host", "example.com")
            .body(Bytes::new())
            .unwrap();

        let mut fcgi = FastcgiRequest::new(1, &config);
        fcgi.write_headers(&request, &client()).unwrap();
        let params = params_of(fcgi);

        assert_eq!(get(&params, "REQUEST_METHOD"), Some("GET"));
        assert_eq!(get(&params, "REQUEST_URI"), Some("/index.php?x=1"));
        assert_eq!(get(&params, "QUERY_STRING"), Some("x=1"));
        assert_eq!(get(&params, "HTTP_HOST"), Some("example.com"));
        assert_eq!(get(&params, "CONTENT_LENGTH"), Some("0"));
        assert_eq!(get(&params, "REMOTE_ADDR"), Some("192.0.2.7"));
        assert_eq!(get(&params, "REMOTE_PORT"), Some("51234"));
        assert_eq!(get(&params, "SERVER_ADDR"), Some("::1"));
        assert_eq!(get(&params, "SERVER_PORT"), Some("8080"));
        assert_eq!(get(&params, "SERVER_SOFTWARE"), Some("test-server"));
        assert_eq!(get(&params, "SERVER_NAME"), Some("test-server"));
        assert_eq!(get(&params, "GATEWAY_INTERFACE"), Some("CGI/1.1"));
        assert_eq!(get(&params, "SERVER_PROTOCOL"), Some("HTTP/1.1"));
        assert_eq!(get(&params, "REDIRECT_STATUS"), Some("200"));
        assert_eq!(get(&params, "CONTENT_TYPE"), None);
    }

    #[test]
    fn post_request_environment() {
        let request = http::Request::post("/form.php")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("accept", "text/html")
            .header("accept", "application/json")
            .body(Bytes::from_static(b"a=1&b=2"))
            .unwrap();

        let mut fcgi = FastcgiRequest::new(1, &FastcgiClientConfig::default());
        fcgi.write_headers(&request, &client()).unwrap();
        let params = params_of(fcgi);

        assert_eq!(get(&params, "QUERY_STRING"), Some(""));
        assert_eq!(get(&params, "CONTENT_LENGTH"), Some("7"));
        assert_eq!(get(&params, "CONTENT_TYPE"), Some("application/x-www-form-urlencoded"));
        assert_eq!(get(&params, "HTTP_CONTENT_TYPE"), Some("application/x-www-form-urlencoded"));
        let accepts: Vec<&str> = params.iter()
            .filter(|(n, _)| n == "HTTP_ACCEPT")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(accepts, vec!["text/html", "application/json"]);
    }

    #[test]
    fn file_headers_use_deepest_root() {
        let roots = StaticRoots::new(vec!["/srv", "/srv/www"]);
        let mut fcgi = FastcgiRequest::new(1, &FastcgiClientConfig::default());
        fcgi.write_file_headers(Path::new("/srv/www/blog/index.php"), &roots, "/blog/index.php")
            .unwrap();
        let params = params_of(fcgi);

        assert_eq!(params, vec![
            ("DOCUMENT_ROOT".to_owned(), "/srv/www".to_owned()),
            ("SCRIPT_FILENAME".to_owned(), "/srv/www/blog/index.php".to_owned()),
            ("SCRIPT_NAME".to_owned(), "/blog/index.php".to_owned()),
        ]);
    }

    #[test]
    fn unresolved_root_writes_nothing() {
        let roots = StaticRoots::new(vec!["/srv/www"]);
        let mut fcgi = FastcgiRequest::new(1, &FastcgiClientConfig::default());
        let err = fcgi.write_file_headers(Path::new("/tmp/evil.php"), &roots, "/evil.php")
            .unwrap_err();
        match err {
            Error::UnresolvedScriptRoot(path) => assert_eq!(path, Path::new("/tmp/evil.php")),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(params_of(fcgi).is_empty());
    }
}
