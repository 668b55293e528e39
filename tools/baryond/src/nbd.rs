//! Linux NBD attachment and request serving.
//!
//! The kernel side of an NBD device talks to its userspace server over a
//! socket. Attachment works BUSE-style: create a socketpair, hand one end
//! to the kernel (`NBD_SET_SOCK` followed by the blocking `NBD_DO_IT`,
//! parked on a helper thread), then serve the request stream on the other
//! end from the calling thread. Exactly one request is in flight at a
//! time, so the array needs no internal locking.
//!
//! Request and reply frames are big-endian on the wire.

use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread;

use anyhow::{Context, Result, bail};
use baryon_raid::Array;

use crate::verbose::vprintln;

// ---------------------------------------------------------------------------
// NBD kernel interface
// ---------------------------------------------------------------------------

const NBD_SET_SOCK: libc::c_ulong = 0xab00;
const NBD_SET_SIZE: libc::c_ulong = 0xab02;
const NBD_DO_IT: libc::c_ulong = 0xab03;
const NBD_CLEAR_SOCK: libc::c_ulong = 0xab04;
const NBD_CLEAR_QUE: libc::c_ulong = 0xab05;
const NBD_SET_FLAGS: libc::c_ulong = 0xab0a;

const NBD_FLAG_HAS_FLAGS: libc::c_ulong = 1 << 0;
const NBD_FLAG_SEND_FLUSH: libc::c_ulong = 1 << 2;

const NBD_REQUEST_MAGIC: u32 = 0x2560_9513;
const NBD_REPLY_MAGIC: u32 = 0x6744_6698;

const NBD_CMD_READ: u32 = 0;
const NBD_CMD_WRITE: u32 = 1;
const NBD_CMD_DISC: u32 = 2;
const NBD_CMD_FLUSH: u32 = 3;

/// Wire size of a request header: magic, type, handle, offset, length.
const REQUEST_LEN: usize = 28;

/// One decoded kernel request.
struct Request {
    kind: u32,
    /// Opaque kernel cookie, echoed back in the reply.
    handle: [u8; 8],
    offset: u64,
    len: usize,
}

impl Request {
    fn parse(frame: &[u8; REQUEST_LEN]) -> Result<Self> {
        let magic = be32(frame, 0);
        if magic != NBD_REQUEST_MAGIC {
            bail!("bad NBD request magic {magic:#010x}");
        }
        let mut handle = [0u8; 8];
        handle.copy_from_slice(&frame[8..16]);
        Ok(Self {
            kind: be32(frame, 4),
            handle,
            offset: u64::from_be_bytes([
                frame[16], frame[17], frame[18], frame[19], frame[20], frame[21], frame[22],
                frame[23],
            ]),
            len: be32(frame, 24) as usize,
        })
    }
}

fn be32(frame: &[u8; REQUEST_LEN], at: usize) -> u32 {
    u32::from_be_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]])
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// Attaches `array` to the NBD device at `nbd_path` and serves requests
/// until the kernel disconnects.
///
/// # Errors
///
/// Attachment ioctl failures and transport socket failures. Per-request
/// I/O failures are replied to the kernel as errno values and do not end
/// the serve loop.
pub fn serve(nbd_path: &Path, array: &mut Array) -> Result<()> {
    let nbd = OpenOptions::new()
        .read(true)
        .write(true)
        .open(nbd_path)
        .with_context(|| format!("cannot open '{}'", nbd_path.display()))?;
    let (kernel_sock, mut serve_sock) = UnixStream::pair().context("socketpair failed")?;

    nbd_ioctl(
        nbd.as_raw_fd(),
        NBD_SET_SIZE,
        array.virtual_size() as libc::c_ulong,
    )
    .context("NBD_SET_SIZE failed")?;
    nbd_ioctl(nbd.as_raw_fd(), NBD_CLEAR_SOCK, 0).context("NBD_CLEAR_SOCK failed")?;
    // Older kernels reject SET_FLAGS; they then simply never send flush.
    let _ = nbd_ioctl(
        nbd.as_raw_fd(),
        NBD_SET_FLAGS,
        NBD_FLAG_HAS_FLAGS | NBD_FLAG_SEND_FLUSH,
    );

    // NBD_DO_IT blocks for the lifetime of the attachment, so it gets its
    // own thread; requests are served on the calling thread.
    let pump = thread::spawn(move || {
        let fd = nbd.as_raw_fd();
        if let Err(err) = nbd_ioctl(fd, NBD_SET_SOCK, kernel_sock.as_raw_fd() as libc::c_ulong) {
            eprintln!("NBD_SET_SOCK failed: {err}");
            return;
        }
        if let Err(err) = nbd_ioctl(fd, NBD_DO_IT, 0) {
            eprintln!("NBD attachment ended: {err}");
        }
        let _ = nbd_ioctl(fd, NBD_CLEAR_QUE, 0);
        let _ = nbd_ioctl(fd, NBD_CLEAR_SOCK, 0);
    });

    let result = request_loop(&mut serve_sock, array);
    drop(serve_sock);
    let _ = pump.join();
    result
}

fn nbd_ioctl(fd: RawFd, request: libc::c_ulong, arg: libc::c_ulong) -> io::Result<()> {
    // SAFETY: fd is a valid open descriptor and every NBD ioctl used here
    // takes either no argument or a plain integer.
    let rc = unsafe { libc::ioctl(fd, request, arg) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Request loop
// ---------------------------------------------------------------------------

fn request_loop(sock: &mut UnixStream, array: &mut Array) -> Result<()> {
    loop {
        let mut frame = [0u8; REQUEST_LEN];
        match sock.read_exact(&mut frame) {
            Ok(()) => {}
            // The kernel tore down the socket; treat it as a disconnect.
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err).context("reading NBD request"),
        }
        let request = Request::parse(&frame)?;

        match request.kind {
            NBD_CMD_READ => {
                vprintln!("R - {}, {}", request.offset, request.len);
                let mut data = vec![0u8; request.len];
                match array.read(&mut data, request.offset) {
                    Ok(()) => {
                        reply(sock, 0, request.handle)?;
                        sock.write_all(&data).context("writing read payload")?;
                    }
                    Err(err) => {
                        eprintln!("read failed at {}: {err}", request.offset);
                        reply(sock, errno(&err), request.handle)?;
                    }
                }
            }
            NBD_CMD_WRITE => {
                vprintln!("W - {}, {}", request.offset, request.len);
                let mut data = vec![0u8; request.len];
                sock.read_exact(&mut data).context("reading write payload")?;
                match array.write(&data, request.offset) {
                    Ok(()) => reply(sock, 0, request.handle)?,
                    Err(err) => {
                        eprintln!("write failed at {}: {err}", request.offset);
                        reply(sock, errno(&err), request.handle)?;
                    }
                }
            }
            NBD_CMD_FLUSH => {
                vprintln!("Received a flush request.");
                // Per-device flush failures are logged but not surfaced;
                // the device errors again on the next request touching it.
                if let Err(err) = array.flush() {
                    eprintln!("flush failed (reported as success): {err}");
                }
                reply(sock, 0, request.handle)?;
            }
            NBD_CMD_DISC => {
                vprintln!("Received a disconnect request.");
                array.disconnect();
                return Ok(());
            }
            other => {
                vprintln!("Unsupported request type {other}.");
                reply(sock, libc::EOPNOTSUPP as u32, request.handle)?;
            }
        }
    }
}

fn reply(sock: &mut UnixStream, error: u32, handle: [u8; 8]) -> Result<()> {
    let mut frame = [0u8; 16];
    frame[0..4].copy_from_slice(&NBD_REPLY_MAGIC.to_be_bytes());
    frame[4..8].copy_from_slice(&error.to_be_bytes());
    frame[8..16].copy_from_slice(&handle);
    sock.write_all(&frame).context("writing NBD reply")
}

fn errno(err: &io::Error) -> u32 {
    err.raw_os_error().unwrap_or(libc::EIO) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parse_decodes_big_endian_fields() {
        let mut frame = [0u8; REQUEST_LEN];
        frame[0..4].copy_from_slice(&NBD_REQUEST_MAGIC.to_be_bytes());
        frame[4..8].copy_from_slice(&NBD_CMD_WRITE.to_be_bytes());
        frame[8..16].copy_from_slice(b"cookie!!");
        frame[16..24].copy_from_slice(&0x1122_3344u64.to_be_bytes());
        frame[24..28].copy_from_slice(&512u32.to_be_bytes());

        let request = Request::parse(&frame).expect("parse should succeed");
        assert_eq!(request.kind, NBD_CMD_WRITE);
        assert_eq!(&request.handle, b"cookie!!");
        assert_eq!(request.offset, 0x1122_3344);
        assert_eq!(request.len, 512);
    }

    #[test]
    fn request_parse_rejects_bad_magic() {
        let frame = [0u8; REQUEST_LEN];
        assert!(Request::parse(&frame).is_err());
    }
}
