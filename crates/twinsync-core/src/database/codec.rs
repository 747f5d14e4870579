//! Binary layout of the sync database
//!
//! ```text
//! "TWSYNCDB" | version: u32 LE | payload | sha256(payload): 32 bytes
//! ```
//!
//! The payload is one recursively encoded [`InSyncDir`]. All integers are
//! little endian, strings are a `u32` byte length followed by UTF-8.

use sha2::{Digest, Sha256};

use super::{DirStatus, InSyncDescriptor, InSyncDir, InSyncFile, InSyncSymlink, InSyncType};
use crate::hierarchy::FileId;

/// File signature
pub const MAGIC: &[u8; 8] = b"TWSYNCDB";

/// Current format version
pub const FORMAT_VERSION: u32 = 1;

const DIGEST_LEN: usize = 32;

/// Serialize `root` into a complete database file image
#[must_use]
pub fn encode(root: &InSyncDir) -> Vec<u8> {
    let mut payload = Vec::new();
    write_dir(&mut payload, root);

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + payload.len() + DIGEST_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&Sha256::digest(&payload));
    out
}

/// Parse a database file image
///
/// # Errors
///
/// Returns a description of the first problem found; nothing is decoded
/// from a file that fails any check.
pub fn decode(data: &[u8]) -> Result<InSyncDir, String> {
    let header_len = MAGIC.len() + 4;
    if data.len() < header_len + DIGEST_LEN {
        return Err("file is too short".to_string());
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err("unknown file signature".to_string());
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&data[MAGIC.len()..header_len]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {version}"));
    }

    let (payload, digest) = data[header_len..].split_at(data.len() - header_len - DIGEST_LEN);
    if Sha256::digest(payload).as_slice() != digest {
        return Err("checksum mismatch".to_string());
    }

    let mut reader = Reader { data: payload, pos: 0 };
    let root = reader.read_dir(DirStatus::Normal)?;
    if reader.pos != payload.len() {
        return Err("unexpected data after end of payload".to_string());
    }
    Ok(root)
}

fn write_u32(buf: &mut Vec<u8>, value: usize) {
    let value = u32::try_from(value).unwrap_or(u32::MAX);
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_u32(buf, s.len());
    buf.extend_from_slice(s.as_bytes());
}

fn write_descriptor(buf: &mut Vec<u8>, d: &InSyncDescriptor) {
    buf.extend_from_slice(&d.mtime.to_le_bytes());
    buf.extend_from_slice(&d.size.to_le_bytes());
    match d.file_id {
        Some(id) => {
            buf.push(1);
            buf.extend_from_slice(&id.device.to_le_bytes());
            buf.extend_from_slice(&id.inode.to_le_bytes());
        }
        None => buf.push(0),
    }
}

const fn in_sync_type_tag(t: InSyncType) -> u8 {
    match t {
        InSyncType::BinaryEqual => 0,
        InSyncType::AttributesEqual => 1,
    }
}

fn write_dir(buf: &mut Vec<u8>, dir: &InSyncDir) {
    write_u32(buf, dir.files.len());
    for (name, file) in &dir.files {
        write_str(buf, name);
        write_descriptor(buf, &file.left);
        write_descriptor(buf, &file.right);
        buf.push(in_sync_type_tag(file.in_sync_type));
    }

    write_u32(buf, dir.symlinks.len());
    for (name, link) in &dir.symlinks {
        write_str(buf, name);
        buf.extend_from_slice(&link.left_mtime.to_le_bytes());
        buf.extend_from_slice(&link.right_mtime.to_le_bytes());
        buf.push(in_sync_type_tag(link.in_sync_type));
    }

    write_u32(buf, dir.dirs.len());
    for (name, sub) in &dir.dirs {
        write_str(buf, name);
        buf.push(match sub.status {
            DirStatus::Normal => 0,
            DirStatus::StrawMan => 1,
        });
        write_dir(buf, sub);
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let end = self.pos.checked_add(N).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            return Err("payload is truncated".to_string());
        };
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, String> {
        Ok(self.take::<1>()?[0])
    }

    fn read_len(&mut self) -> Result<usize, String> {
        let len = u32::from_le_bytes(self.take()?);
        usize::try_from(len).map_err(|_| "length out of range".to_string())
    }

    fn read_i64(&mut self) -> Result<i64, String> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    fn read_u64(&mut self) -> Result<u64, String> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    fn read_string(&mut self) -> Result<String, String> {
        let len = self.read_len()?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| "payload is truncated".to_string())?;
        let s = std::str::from_utf8(&self.data[self.pos..end])
            .map_err(|_| "item name is not valid UTF-8".to_string())?
            .to_string();
        self.pos = end;
        Ok(s)
    }

    fn read_descriptor(&mut self) -> Result<InSyncDescriptor, String> {
        let mtime = self.read_i64()?;
        let size = self.read_u64()?;
        let file_id = match self.read_u8()? {
            0 => None,
            1 => Some(FileId {
                device: self.read_u64()?,
                inode: self.read_u64()?,
            }),
            tag => return Err(format!("invalid file id tag {tag}")),
        };
        Ok(InSyncDescriptor { mtime, size, file_id })
    }

    fn read_in_sync_type(&mut self) -> Result<InSyncType, String> {
        match self.read_u8()? {
            0 => Ok(InSyncType::BinaryEqual),
            1 => Ok(InSyncType::AttributesEqual),
            tag => Err(format!("invalid in-sync type {tag}")),
        }
    }

    fn read_dir(&mut self, status: DirStatus) -> Result<InSyncDir, String> {
        let mut dir = InSyncDir::new(status);

        for _ in 0..self.read_len()? {
            let name = self.read_string()?;
            let left = self.read_descriptor()?;
            let right = self.read_descriptor()?;
            let in_sync_type = self.read_in_sync_type()?;
            dir.files.insert(name, InSyncFile { left, right, in_sync_type });
        }

        for _ in 0..self.read_len()? {
            let name = self.read_string()?;
            let left_mtime = self.read_i64()?;
            let right_mtime = self.read_i64()?;
            let in_sync_type = self.read_in_sync_type()?;
            dir.symlinks.insert(
                name,
                InSyncSymlink {
                    left_mtime,
                    right_mtime,
                    in_sync_type,
                },
            );
        }

        for _ in 0..self.read_len()? {
            let name = self.read_string()?;
            let status = match self.read_u8()? {
                0 => DirStatus::Normal,
                1 => DirStatus::StrawMan,
                tag => return Err(format!("invalid directory status {tag}")),
            };
            let sub = self.read_dir(status)?;
            dir.dirs.insert(name, sub);
        }

        Ok(dir)
    }
}
