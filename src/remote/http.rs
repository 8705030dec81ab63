use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{AppError, AppResult, RemoteError};

const MAX_LINE_BYTES: usize = 8 * 1024;
const MAX_HEADER_BYTES: usize = 64 * 1024;
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

pub(super) struct HttpRequest {
    pub(super) method: String,
    pub(super) path: String,
    pub(super) body: Vec<u8>,
}

/// A request that could not be served; carries the status code to answer
/// with.
pub(super) struct WireFailure {
    pub(super) status: u16,
    pub(super) message: String,
}

impl WireFailure {
    pub(super) fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Reads one HTTP/1.1 request line by line, then the full body, before
/// dispatch. Only `Content-Length` is interpreted; other headers are
/// accepted and skipped.
pub(super) async fn read_http_request(socket: &mut TcpStream) -> Result<HttpRequest, WireFailure> {
    let mut reader = BufReader::new(socket);

    let request_line = read_crlf_line(&mut reader).await?;
    let mut pieces = request_line.split(' ').filter(|piece| !piece.is_empty());
    let method = pieces
        .next()
        .ok_or_else(|| WireFailure::new(400, "Malformed request line"))?
        .to_owned();
    let path = pieces
        .next()
        .ok_or_else(|| WireFailure::new(400, "Malformed request line"))?
        .to_owned();

    let mut content_length = 0usize;
    let mut header_bytes = 0usize;
    loop {
        let line = read_crlf_line(&mut reader).await?;
        if line.is_empty() {
            break;
        }
        header_bytes = header_bytes.saturating_add(line.len());
        if header_bytes > MAX_HEADER_BYTES {
            return Err(WireFailure::new(431, "Header section too large"));
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(WireFailure::new(400, "Header line without a colon"));
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value
                .trim()
                .parse()
                .map_err(|_| WireFailure::new(400, "Bad Content-Length header"))?;
        }
    }
    if content_length > MAX_BODY_BYTES {
        return Err(WireFailure::new(413, "Body exceeds size limit"));
    }

    let mut body = vec![0u8; content_length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|err| WireFailure::new(400, format!("Body ended early: {}", err)))?;

    Ok(HttpRequest { method, path, body })
}

/// One line up to and including `\n`, with the line ending stripped. An
/// empty string is the blank separator before the body.
async fn read_crlf_line<R>(reader: &mut R) -> Result<String, WireFailure>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::with_capacity(128);
    let mut limited = (&mut *reader).take(MAX_LINE_BYTES as u64 + 1);
    let bytes = limited.read_until(b'\n', &mut raw).await.map_err(|err| {
        WireFailure::new(400, format!("Connection error while reading request: {}", err))
    })?;
    if bytes == 0 {
        return Err(WireFailure::new(400, "Connection closed mid-request"));
    }
    if raw.len() > MAX_LINE_BYTES {
        return Err(WireFailure::new(431, "Request line too long"));
    }
    while raw.last().is_some_and(|byte| *byte == b'\n' || *byte == b'\r') {
        raw.pop();
    }
    String::from_utf8(raw).map_err(|_| WireFailure::new(400, "Request is not valid UTF-8"))
}

const fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        405 => "Method Not Allowed",
        // The completion signal; must stay distinguishable from 404.
        410 => "Gone",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

/// Writes a response with an empty body; `Content-Length` is always set.
pub(super) async fn write_empty_response(socket: &mut TcpStream, status: u16) -> AppResult<()> {
    write_response(socket, status, "text/plain", &[]).await
}

pub(super) async fn write_json_response<T>(
    socket: &mut TcpStream,
    status: u16,
    response: &T,
) -> AppResult<()>
where
    T: Serialize,
{
    let body = serde_json::to_vec(response).map_err(|err| {
        AppError::remote(RemoteError::Serialize {
            context: "wire response",
            source: err,
        })
    })?;
    write_response(socket, status, "application/json", &body).await
}

pub(super) async fn write_error_response(
    socket: &mut TcpStream,
    status: u16,
    message: &str,
) -> AppResult<()> {
    #[derive(Serialize)]
    struct ErrorBody<'msg> {
        error: &'msg str,
    }
    write_json_response(socket, status, &ErrorBody { error: message }).await
}

async fn write_response(
    socket: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> AppResult<()> {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        status_text(status),
        content_type,
        body.len()
    );
    socket.write_all(head.as_bytes()).await.map_err(|err| {
        AppError::remote(RemoteError::Io {
            context: "write response head",
            source: err,
        })
    })?;
    socket.write_all(body).await.map_err(|err| {
        AppError::remote(RemoteError::Io {
            context: "write response body",
            source: err,
        })
    })
}
