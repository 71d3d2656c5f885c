//! Minimal HTTPS client over WinHTTP.
//!
//! `get()` fetches small text responses (the release descriptor);
//! `download()` streams a large body into a caller-provided sink with
//! cooperative cancellation between reads. Both are synchronous and
//! meant to run on worker threads. WinHTTP follows redirects
//! automatically, so GitHub release asset downloads (which redirect
//! to `objects.githubusercontent.com`) work transparently.

use std::ffi::c_void;

use windows::Win32::Networking::WinHttp::{
    WINHTTP_ACCESS_TYPE_AUTOMATIC_PROXY, WINHTTP_FLAG_SECURE, WINHTTP_QUERY_CONTENT_LENGTH,
    WINHTTP_QUERY_FLAG_NUMBER, WinHttpCloseHandle, WinHttpConnect, WinHttpOpen,
    WinHttpOpenRequest, WinHttpQueryDataAvailable, WinHttpQueryHeaders, WinHttpReadData,
    WinHttpReceiveResponse, WinHttpSendRequest, WinHttpSetTimeouts,
};
use windows::core::PCWSTR;

/// Read buffer size for the streaming download loop.
const CHUNK_SIZE: usize = 64 * 1024;

/// RAII wrapper for WinHTTP handles. Calls `WinHttpCloseHandle` on drop.
struct Handle(*mut c_void);

impl Handle {
    fn new(h: *mut c_void) -> Result<Self, String> {
        if h.is_null() {
            Err("WinHTTP returned null handle".into())
        } else {
            Ok(Self(h))
        }
    }

    fn ptr(&self) -> *mut c_void {
        self.0
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                let _ = WinHttpCloseHandle(self.0);
            }
        }
    }
}

/// Receives a streamed response body.
pub trait DownloadSink {
    /// Called once before the first chunk with the Content-Length, if
    /// the server sent one.
    fn on_length(&mut self, total: Option<u64>);

    /// Called for each chunk read. Returning `false` cancels the
    /// transfer; an `Err` aborts it.
    fn on_chunk(&mut self, chunk: &[u8]) -> Result<bool, String>;
}

/// How a streamed transfer ended (errors are the `Err` side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadEnd {
    Complete,
    Cancelled,
}

/// Performs a synchronous HTTPS GET and returns the body as text.
///
/// `timeout_ms` applies independently to each WinHTTP phase (resolve,
/// connect, send, receive). Returns `Err` on any network or protocol
/// failure; callers treat errors as non-fatal.
pub fn get(host: &str, path: &str, timeout_ms: i32) -> Result<String, String> {
    struct Buffer(Vec<u8>);
    impl DownloadSink for Buffer {
        fn on_length(&mut self, _total: Option<u64>) {}
        fn on_chunk(&mut self, chunk: &[u8]) -> Result<bool, String> {
            self.0.extend_from_slice(chunk);
            Ok(true)
        }
    }

    let mut buffer = Buffer(Vec::new());
    download(host, path, timeout_ms, &mut buffer)?;
    String::from_utf8(buffer.0).map_err(|e| e.to_string())
}

/// Performs a synchronous HTTPS GET, streaming the body into `sink`.
pub fn download(
    host: &str,
    path: &str,
    timeout_ms: i32,
    sink: &mut dyn DownloadSink,
) -> Result<DownloadEnd, String> {
    let agent = to_wide(concat!("velario/", env!("CARGO_PKG_VERSION")));
    let host_w = to_wide(host);
    let path_w = to_wide(path);

    unsafe {
        let session = Handle::new(WinHttpOpen(
            PCWSTR(agent.as_ptr()),
            WINHTTP_ACCESS_TYPE_AUTOMATIC_PROXY,
            None,
            None,
            0,
        ))?;

        WinHttpSetTimeouts(
            session.ptr(),
            timeout_ms,
            timeout_ms,
            timeout_ms,
            timeout_ms,
        )
        .map_err(|e| e.message().to_string())?;

        let connect = Handle::new(WinHttpConnect(
            session.ptr(),
            PCWSTR(host_w.as_ptr()),
            443,
            0,
        ))?;

        let request = Handle::new(WinHttpOpenRequest(
            connect.ptr(),
            PCWSTR(to_wide("GET").as_ptr()),
            PCWSTR(path_w.as_ptr()),
            None,
            None,
            std::ptr::null(),
            WINHTTP_FLAG_SECURE,
        ))?;

        WinHttpSendRequest(request.ptr(), None, None, 0, 0, 0)
            .map_err(|e| e.message().to_string())?;

        WinHttpReceiveResponse(request.ptr(), std::ptr::null_mut())
            .map_err(|e| e.message().to_string())?;

        sink.on_length(content_length(request.ptr()));

        stream_body(request.ptr(), sink)
    }
}

/// Reads the response body chunk by chunk into the sink.
unsafe fn stream_body(
    request: *mut c_void,
    sink: &mut dyn DownloadSink,
) -> Result<DownloadEnd, String> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let mut available: u32 = 0;
        unsafe {
            WinHttpQueryDataAvailable(request, &mut available)
                .map_err(|e| e.message().to_string())?;
        }
        if available == 0 {
            return Ok(DownloadEnd::Complete);
        }

        let to_read = (available as usize).min(buf.len()) as u32;
        let mut read: u32 = 0;
        unsafe {
            WinHttpReadData(request, buf.as_mut_ptr().cast(), to_read, &mut read)
                .map_err(|e| e.message().to_string())?;
        }
        if read == 0 {
            return Ok(DownloadEnd::Complete);
        }

        if !sink.on_chunk(&buf[..read as usize])? {
            return Ok(DownloadEnd::Cancelled);
        }
    }
}

/// Returns the Content-Length header, if the server sent one.
unsafe fn content_length(request: *mut c_void) -> Option<u64> {
    let mut value: u32 = 0;
    let mut size = size_of::<u32>() as u32;
    // SAFETY: WinHttpQueryHeaders with WINHTTP_QUERY_FLAG_NUMBER writes
    // a u32 into the provided buffer. Chunked responses have no
    // Content-Length and make the call fail, which is fine.
    let result = unsafe {
        WinHttpQueryHeaders(
            request,
            WINHTTP_QUERY_CONTENT_LENGTH | WINHTTP_QUERY_FLAG_NUMBER,
            PCWSTR::null(),
            Some((&raw mut value).cast()),
            &mut size,
            None,
        )
    };
    result.ok().map(|()| u64::from(value))
}

/// Converts a `&str` to a null-terminated wide (UTF-16) string.
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
