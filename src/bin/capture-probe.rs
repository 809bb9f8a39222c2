use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use capture_echo::capture::{CaptureDocument, CapturedRequest};
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "capture-probe")]
#[command(about = "Send raw request bytes to a capture server and decode its answers", long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:80")]
    addr: String,

    /// File with the raw request bytes (stdin when omitted)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Stop reading responses after this long
    #[arg(short, long, default_value_t = 2000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let raw = match &cli.file {
        Some(path) => std::fs::read(path)?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let mut stream = TcpStream::connect(&cli.addr).await?;
    stream.write_all(&raw).await?;
    stream.shutdown().await?;

    let mut received = Vec::new();
    let read = stream.read_to_end(&mut received);
    if tokio::time::timeout(Duration::from_millis(cli.timeout_ms), read)
        .await
        .is_err()
    {
        eprintln!("(timed out; showing what arrived)");
    }

    let mut rest = &received[..];
    while !rest.is_empty() {
        let Some((status, body, consumed)) = next_response(rest)? else {
            eprintln!("(incomplete response, {} bytes left)", rest.len());
            break;
        };
        rest = &rest[consumed..];

        if status != 200 {
            println!("{} (no capture)", status);
            continue;
        }
        match CaptureDocument::from_json(body).and_then(|doc| doc.decode()) {
            Ok(capture) => print_capture(&capture),
            Err(e) => println!("200 with undecodable document: {}", e),
        }
    }

    Ok(())
}

/// Split one response off the front of `buf`: status, body and bytes consumed.
fn next_response(buf: &[u8]) -> Result<Option<(u16, &[u8], usize)>, Box<dyn std::error::Error>> {
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut response = httparse::Response::new(&mut headers);
    let head_len = match response.parse(buf)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let status = response.code.unwrap_or(0);
    let length = response
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("content-length"))
        .map(|h| std::str::from_utf8(h.value).map(|v| v.trim().parse::<usize>()))
        .transpose()?
        .transpose()?
        .unwrap_or(0);

    // Interim 100 Continue carries no body.
    if status == 100 {
        return next_response(&buf[head_len..])
            .map(|next| next.map(|(s, b, n)| (s, b, n + head_len)));
    }

    let end = head_len + length;
    if buf.len() < end {
        return Ok(None);
    }
    Ok(Some((status, &buf[head_len..end], end)))
}

fn print_capture(capture: &CapturedRequest) {
    println!(
        "{} {} {}",
        capture.method.escape_ascii(),
        capture.target.escape_ascii(),
        capture.version.escape_ascii()
    );
    for (name, value) in &capture.headers {
        println!("{}: {}", name.escape_ascii(), value.escape_ascii());
    }
    println!();
    println!("{}", capture.body.escape_ascii());
    println!("---");
}
