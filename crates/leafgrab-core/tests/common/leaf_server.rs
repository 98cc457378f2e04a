//! Minimal HTTP/1.1 server that mimics the archive's leaf preview endpoint
//! for integration tests.
//!
//! Any GET carrying `page=leaf{N}` in the query string is answered with
//! HTTP 200: the leaf body when `N` is within range, otherwise a fixed
//! placeholder body ("missing leaf" is never signalled via status code).

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

/// Placeholder body served for out-of-range leaf indices.
pub const SENTINEL_BODY: &[u8] = b"plz upgrade to a paid account to view this page\n";

/// Body served for a valid leaf index; unique per index.
pub fn leaf_body(index: u64) -> Vec<u8> {
    format!("jpeg bytes of leaf {}\n", index).into_bytes()
}

/// Starts a server in a background thread serving leaves `0..=max_valid`.
/// Returns the base URL (e.g. "http://127.0.0.1:12345"). The server runs
/// until the process exits.
pub fn start(max_valid: u64) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || handle(stream, max_valid));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: std::net::TcpStream, max_valid: u64) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };

    let body = match leaf_index(request) {
        Some(i) if i <= max_valid => leaf_body(i),
        Some(_) => SENTINEL_BODY.to_vec(),
        None => {
            let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n");
            return;
        }
    };

    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: image/jpeg\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
}

/// Extracts `N` from the `page=leafN` query parameter of the request line.
fn leaf_index(request: &str) -> Option<u64> {
    let target = request.split_whitespace().nth(1)?;
    let query = target.split_once('?')?.1;
    let page = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("page="))?;
    page.strip_prefix("leaf")?.parse().ok()
}
