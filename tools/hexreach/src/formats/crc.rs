//! CRC-64 footers for the binary graph format
//!
//! A file carries two checksums: one over the body sections only and one
//! over header + body, so a damaged header is told apart from damaged arrays.

use crc::{Crc, CRC_64_GO_ISO};

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

/// Body and whole-file digests fed side by side while streaming a file out
pub struct FooterDigest {
    body: crc::Digest<'static, u64>,
    file: crc::Digest<'static, u64>,
}

/// `(body_crc64, file_crc64)`
pub type Footer = (u64, u64);

impl FooterDigest {
    pub fn new() -> Self {
        Self {
            body: CRC64.digest(),
            file: CRC64.digest(),
        }
    }

    pub fn header(&mut self, bytes: &[u8]) {
        self.file.update(bytes);
    }

    pub fn body(&mut self, bytes: &[u8]) {
        self.body.update(bytes);
        self.file.update(bytes);
    }

    pub fn finish(self) -> Footer {
        (self.body.finalize(), self.file.finalize())
    }
}

impl Default for FooterDigest {
    fn default() -> Self {
        Self::new()
    }
}

/// Which part of a file failed its footer check, if any
pub fn verify(header: &[u8], body: &[u8], footer: Footer) -> Option<&'static str> {
    if checksum(body) != footer.0 {
        return Some("body CRC mismatch");
    }
    let mut file = CRC64.digest();
    file.update(header);
    file.update(body);
    if file.finalize() != footer.1 {
        return Some("file CRC mismatch");
    }
    None
}
