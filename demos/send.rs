//! Send one GET request for a script to a FastCGI backend listening on TCP.
//!
//! usage: send <backend addr> <document root> <request path>

use tokio_fastcgi_client::*;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use std::env;
use std::path::Path;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("usage: {} <backend addr> <document root> <request path>", args[0]);
        std::process::exit(1);
    }
    let (backend, root, path) = (&args[1], &args[2], &args[3]);

    let stream = TcpStream::connect(backend).await.expect("failed to connect to backend");
    let client = ClientAddrs::from_stream(&stream).expect("no socket addresses");
    let (mut reader, writer) = stream.into_split();
    let connection = FastcgiConnection::spawn(writer);

    let request = http::Request::get(path.as_str())
        .header("host", "localhost")
        .body(Bytes::new())
        .expect("invalid request path");

    let config = FastcgiClientConfig::default();
    let roots = StaticRoots::new(vec![root.as_str()]);
    let script = Path::new(root).join(path.trim_start_matches('/'));

    let mut fcgi = FastcgiRequest::new(connection.next_request_id(), &config);
    let result = fcgi.write_file_headers(&script, &roots, path)
        .and_then(|()| fcgi.write_headers(&request, &client))
        .and_then(|()| fcgi.send(None, &mut connection.writer()));
    if let Err(e) = result {
        eprintln!("failed to send request: {}", e);
        std::process::exit(1);
    }

    // The response stream is left undecoded; show how much came back.
    let mut response = vec![0u8; 64 * 1024];
    match reader.read(&mut response).await {
        Ok(n) => println!("backend answered with {} bytes", n),
        Err(e) => eprintln!("failed to read response: {}", e),
    }
}
