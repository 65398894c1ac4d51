//! A stand-in FastCGI backend that prints every record it receives on a Unix socket.

use tokio_fastcgi_client::*;

use futures::StreamExt;
use tokio::net::UnixListener;
use tokio_util::codec::FramedRead;

use std::fs;
use std::io;

fn print_record(record: FastcgiRecord) {
    println!("request id: {}", record.request_id);
    match record.body {
        FastcgiRecordBody::BeginRequest(begin) => println!("  {:?}", begin),
        FastcgiRecordBody::Params(ref params) if params.is_empty() => println!("  end of params"),
        FastcgiRecordBody::Params(params) => {
            for (name, value) in params {
                println!("  {} = {}",
                         String::from_utf8_lossy(&name),
                         String::from_utf8_lossy(&value));
            }
        },
        FastcgiRecordBody::Stdin(ref data) if data.is_empty() => println!("  end of stdin"),
        FastcgiRecordBody::Stdin(data) => println!("  stdin: {} bytes", data.len()),
        other => println!("  {:?}", other),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let filename = "dump.sock";
    if let Err(e) = fs::remove_file(filename) {
        if e.kind() != io::ErrorKind::NotFound {
            panic!("failed to remove existing socket file {:?}: {}", filename, e);
        }
    }

    let listener = UnixListener::bind(filename).expect("failed to bind socket");

    loop {
        let (socket, addr) = listener.accept().await.expect("failed to accept");
        println!("New connection: {:?}", addr);

        tokio::spawn(async move {
            let mut records = FramedRead::new(socket, FastcgiRecordDecoder);
            while let Some(record) = records.next().await {
                match record {
                    Ok(record) => print_record(record),
                    Err(e) => {
                        println!("bad record: {}", e);
                        break;
                    }
                }
            }
        });
    }
}
