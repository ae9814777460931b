//! Double-SHA256 hashing, used for both block hashes and message checksums.

use std::io;

use sha2::{Digest, Sha256};

use super::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// An incremental double-SHA256 hasher that can be written to like any other
/// [`io::Write`] sink, so a type can hash itself by serializing into one.
#[derive(Default)]
pub struct Writer(Sha256);

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Writer {
    /// Finish hashing and return the double-SHA256 digest, reversed into the
    /// little-endian byte order Bitcoin uses for hashes on the wire.
    pub fn finish(self) -> [u8; 32] {
        let first = self.0.finalize();
        let second = Sha256::digest(&first[..]);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&second[..]);
        bytes
    }
}

/// Computes `SHA256(SHA256(data))`.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let mut writer = Writer::default();
    io::Write::write_all(&mut writer, data).expect("writing to a Sha256 writer is infallible");
    writer.finish()
}

/// The first four bytes of a double-SHA256 digest, used as a frame checksum.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Checksum(pub [u8; 4]);

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("sha256d::Checksum")
            .field(&hex::encode(&self.0))
            .finish()
    }
}

impl<'a> From<&'a [u8]> for Checksum {
    fn from(data: &'a [u8]) -> Self {
        let digest = double_sha256(data);
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&digest[0..4]);
        Checksum(checksum)
    }
}

impl BitcoinSerialize for Checksum {
    fn bitcoin_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(&self.0)
    }
}

impl BitcoinDeserialize for Checksum {
    fn bitcoin_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Checksum(<[u8; 4]>::bitcoin_deserialize(reader)?))
    }
}
