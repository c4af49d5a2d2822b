//! Streaming Adler-32 over a file.

use adler2::Adler32;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 16 * 1024;

/// Adler-32 of everything `reader` yields.
pub fn checksum_reader(mut reader: impl Read) -> io::Result<u32> {
    let mut adler = Adler32::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(adler.checksum()),
            Ok(read) => adler.write_slice(&buf[..read]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

pub fn checksum(path: impl AsRef<Path>) -> io::Result<u32> {
    checksum_reader(File::open(path)?)
}
