use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use std::time::SystemTime;

use anyhow::{Result, bail};
use time::OffsetDateTime;

/// Marker stored in 32-bit fields whose real value lives in the ZIP64 extra field
pub const ZIP64_U32_MARKER: u32 = 0xFFFF_FFFF;
/// Marker stored in 16-bit entry counts when the ZIP64 EOCD holds the real count
pub const ZIP64_U16_MARKER: u16 = 0xFFFF;
/// Header ID of the ZIP64 extended information extra field
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Version needed to extract: 2.0 (deflate)
pub const VERSION_DEFLATE: u16 = 20;
/// Version needed to extract: 4.5 (ZIP64)
pub const VERSION_ZIP64: u16 = 45;

/// General purpose flag bit 11: file name is UTF-8
pub const FLAG_UTF8_NAME: u16 = 1 << 11;

/// "Version made by" for entries written on this host.
///
/// The upper byte is the host system (3 = Unix), which tells readers how to
/// interpret the external attributes.
pub const fn host_version_made_by() -> u16 {
    if cfg!(unix) {
        (3 << 8) | VERSION_ZIP64
    } else {
        VERSION_ZIP64
    }
}

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Build the record for a single-disk archive, saturating any field
    /// that overflows into its ZIP64 marker.
    pub fn for_directory(entries: u64, cd_size: u64, cd_offset: u64) -> Self {
        let entries = u16::try_from(entries)
            .ok()
            .filter(|n| *n != ZIP64_U16_MARKER)
            .unwrap_or(ZIP64_U16_MARKER);
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size: saturate_u32(cd_size),
            cd_offset: saturate_u32(cd_offset),
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid End of Central Directory");
        }

        // Verify signature
        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(Self::SIGNATURE);
        buf.write_u16::<LittleEndian>(self.disk_number)?;
        buf.write_u16::<LittleEndian>(self.disk_with_cd)?;
        buf.write_u16::<LittleEndian>(self.disk_entries)?;
        buf.write_u16::<LittleEndian>(self.total_entries)?;
        buf.write_u32::<LittleEndian>(self.cd_size)?;
        buf.write_u32::<LittleEndian>(self.cd_offset)?;
        buf.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(buf)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == ZIP64_U16_MARKER
            || self.total_entries == ZIP64_U16_MARKER
            || self.cd_size == ZIP64_U32_MARKER
            || self.cd_offset == ZIP64_U32_MARKER
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid ZIP64 format");
        }

        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(Self::SIGNATURE);
        buf.write_u32::<LittleEndian>(self.disk_with_eocd64)?;
        buf.write_u64::<LittleEndian>(self.eocd64_offset)?;
        buf.write_u32::<LittleEndian>(self.total_disks)?;
        Ok(buf)
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn for_directory(entries: u64, cd_size: u64, cd_offset: u64) -> Self {
        Self {
            // Size of the record not counting the signature and this field
            eocd64_size: (Self::MIN_SIZE - 12) as u64,
            version_made_by: host_version_made_by(),
            version_needed: VERSION_ZIP64,
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE {
            bail!("Invalid ZIP64 format");
        }

        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::MIN_SIZE);
        buf.extend_from_slice(Self::SIGNATURE);
        buf.write_u64::<LittleEndian>(self.eocd64_size)?;
        buf.write_u16::<LittleEndian>(self.version_made_by)?;
        buf.write_u16::<LittleEndian>(self.version_needed)?;
        buf.write_u32::<LittleEndian>(self.disk_number)?;
        buf.write_u32::<LittleEndian>(self.disk_with_cd)?;
        buf.write_u64::<LittleEndian>(self.disk_entries)?;
        buf.write_u64::<LittleEndian>(self.total_entries)?;
        buf.write_u64::<LittleEndian>(self.cd_size)?;
        buf.write_u64::<LittleEndian>(self.cd_offset)?;
        Ok(buf)
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Local File Header as written in front of each entry's data.
///
/// The CRC and sizes are unknown until the data has been compressed, so the
/// writer emits this with zeroes and patches the fields afterwards. When
/// `zip64` is set the size fields hold the ZIP64 marker and a 16-byte ZIP64
/// extra field is reserved for the real values.
#[derive(Debug, Clone)]
pub struct LocalFileHeader<'a> {
    pub file_name: &'a str,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub zip64: bool,
}

impl LocalFileHeader<'_> {
    /// Encode the header. The encoded length depends only on the name and
    /// `zip64`, so a patched header can overwrite the placeholder in place.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let name = self.file_name.as_bytes();
        let name_len = u16::try_from(name.len())
            .map_err(|_| anyhow::anyhow!("Entry name too long: {}", self.file_name))?;

        let mut extra = Vec::new();
        let (compressed, uncompressed, version_needed) = if self.zip64 {
            extra.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
            extra.write_u16::<LittleEndian>(16)?;
            extra.write_u64::<LittleEndian>(self.uncompressed_size)?;
            extra.write_u64::<LittleEndian>(self.compressed_size)?;
            (ZIP64_U32_MARKER, ZIP64_U32_MARKER, VERSION_ZIP64)
        } else {
            (
                u32::try_from(self.compressed_size)?,
                u32::try_from(self.uncompressed_size)?,
                VERSION_DEFLATE,
            )
        };

        let mut buf = Vec::with_capacity(LFH_SIZE + name.len() + extra.len());
        buf.extend_from_slice(LFH_SIGNATURE);
        buf.write_u16::<LittleEndian>(version_needed)?;
        buf.write_u16::<LittleEndian>(self.flags)?;
        buf.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        buf.write_u16::<LittleEndian>(self.last_mod_time)?;
        buf.write_u16::<LittleEndian>(self.last_mod_date)?;
        buf.write_u32::<LittleEndian>(self.crc32)?;
        buf.write_u32::<LittleEndian>(compressed)?;
        buf.write_u32::<LittleEndian>(uncompressed)?;
        buf.write_u16::<LittleEndian>(name_len)?;
        buf.write_u16::<LittleEndian>(extra.len() as u16)?;
        buf.extend_from_slice(name);
        buf.extend_from_slice(&extra);
        Ok(buf)
    }
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub version_made_by: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub external_attrs: u32,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Encode the Central Directory File Header for this entry.
    ///
    /// Sizes and the local header offset that do not fit in 32 bits are
    /// moved into a ZIP64 extra field, in the order the format mandates
    /// (uncompressed, compressed, offset).
    pub fn to_central_header(&self) -> Result<Vec<u8>> {
        let name = self.file_name.as_bytes();
        let name_len = u16::try_from(name.len())
            .map_err(|_| anyhow::anyhow!("Entry name too long: {}", self.file_name))?;

        let mut zip64 = Vec::new();
        let uncompressed = split_zip64(self.uncompressed_size, &mut zip64);
        let compressed = split_zip64(self.compressed_size, &mut zip64);
        let lfh_offset = split_zip64(self.lfh_offset, &mut zip64);

        let mut extra = Vec::new();
        let version_needed = if zip64.is_empty() {
            VERSION_DEFLATE
        } else {
            extra.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
            extra.write_u16::<LittleEndian>(zip64.len() as u16)?;
            extra.extend_from_slice(&zip64);
            VERSION_ZIP64
        };

        let mut buf = Vec::with_capacity(CDFH_MIN_SIZE + name.len() + extra.len());
        buf.extend_from_slice(CDFH_SIGNATURE);
        buf.write_u16::<LittleEndian>(self.version_made_by)?;
        buf.write_u16::<LittleEndian>(version_needed)?;
        buf.write_u16::<LittleEndian>(self.flags)?;
        buf.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        buf.write_u16::<LittleEndian>(self.last_mod_time)?;
        buf.write_u16::<LittleEndian>(self.last_mod_date)?;
        buf.write_u32::<LittleEndian>(self.crc32)?;
        buf.write_u32::<LittleEndian>(compressed)?;
        buf.write_u32::<LittleEndian>(uncompressed)?;
        buf.write_u16::<LittleEndian>(name_len)?;
        buf.write_u16::<LittleEndian>(extra.len() as u16)?;
        buf.write_u16::<LittleEndian>(0)?; // comment length
        buf.write_u16::<LittleEndian>(0)?; // disk number start
        buf.write_u16::<LittleEndian>(0)?; // internal attributes
        buf.write_u32::<LittleEndian>(self.external_attrs)?;
        buf.write_u32::<LittleEndian>(lfh_offset)?;
        buf.extend_from_slice(name);
        buf.extend_from_slice(&extra);
        Ok(buf)
    }
}

fn saturate_u32(value: u64) -> u32 {
    u32::try_from(value)
        .ok()
        .filter(|v| *v != ZIP64_U32_MARKER)
        .unwrap_or(ZIP64_U32_MARKER)
}

/// Return the 32-bit header value for `value`, appending it to `zip64`
/// when it needs the extended field.
fn split_zip64(value: u64, zip64: &mut Vec<u8>) -> u32 {
    let header = saturate_u32(value);
    if header == ZIP64_U32_MARKER {
        zip64.extend_from_slice(&value.to_le_bytes());
    }
    header
}

/// Convert a timestamp to MS-DOS (time, date) fields, in UTC.
///
/// DOS dates cover 1980 through 2107; anything outside is clamped to the
/// nearest representable value.
pub fn dos_datetime(timestamp: SystemTime) -> (u16, u16) {
    const EARLIEST: (u16, u16) = (0, (1 << 5) | 1);
    const LATEST: (u16, u16) = ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);

    let dt = OffsetDateTime::from(timestamp);
    match dt.year() {
        ..=1979 => EARLIEST,
        2108.. => LATEST,
        year => {
            let date = (((year - 1980) as u16) << 9)
                | ((u8::from(dt.month()) as u16) << 5)
                | dt.day() as u16;
            let time =
                ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
            (time, date)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn entry(name: &str) -> ZipFileEntry {
        ZipFileEntry {
            file_name: name.to_string(),
            version_made_by: host_version_made_by(),
            flags: FLAG_UTF8_NAME,
            compression_method: CompressionMethod::Deflate,
            compressed_size: 10,
            uncompressed_size: 20,
            crc32: 0xDEAD_BEEF,
            lfh_offset: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            external_attrs: 0,
            is_directory: false,
        }
    }

    #[test]
    fn dos_datetime_encodes_utc_fields() {
        // 2024-03-15 13:45:31 UTC
        let ts = UNIX_EPOCH + Duration::from_secs(1_710_510_331);
        let (time, date) = dos_datetime(ts);

        let mut e = entry("x");
        e.last_mod_time = time;
        e.last_mod_date = date;
        assert_eq!(e.mod_date(), (2024, 3, 15));
        assert_eq!(e.mod_time(), (13, 45, 30));
    }

    #[test]
    fn dos_datetime_clamps_before_1980() {
        let (time, date) = dos_datetime(UNIX_EPOCH);
        let mut e = entry("x");
        e.last_mod_time = time;
        e.last_mod_date = date;
        assert_eq!(e.mod_date(), (1980, 1, 1));
        assert_eq!(e.mod_time(), (0, 0, 0));
    }

    #[test]
    fn small_entry_has_no_zip64_extra() {
        let bytes = entry("dir/file.txt").to_central_header().unwrap();
        assert_eq!(bytes.len(), CDFH_MIN_SIZE + "dir/file.txt".len());
        assert_eq!(&bytes[0..4], CDFH_SIGNATURE);
        // version needed
        assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), VERSION_DEFLATE);
    }

    #[test]
    fn large_offset_moves_into_zip64_extra() {
        let mut e = entry("big");
        e.lfh_offset = 5 << 32;
        let bytes = e.to_central_header().unwrap();

        // offset field holds the marker, extra holds the real value
        assert_eq!(&bytes[42..46], &ZIP64_U32_MARKER.to_le_bytes());
        let extra = &bytes[CDFH_MIN_SIZE + 3..];
        assert_eq!(&extra[0..2], &ZIP64_EXTRA_ID.to_le_bytes());
        assert_eq!(&extra[2..4], &8u16.to_le_bytes());
        assert_eq!(&extra[4..12], &(5u64 << 32).to_le_bytes());
    }

    #[test]
    fn eocd_saturates_overflowing_fields() {
        let eocd = EndOfCentralDirectory::for_directory(70_000, 100, 6 << 30);
        assert!(eocd.is_zip64());
        assert_eq!(eocd.total_entries, ZIP64_U16_MARKER);
        assert_eq!(eocd.cd_offset, ZIP64_U32_MARKER);
        assert_eq!(eocd.cd_size, 100);

        let parsed = EndOfCentralDirectory::from_bytes(&eocd.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, eocd);
    }

    #[test]
    fn local_header_reserves_zip64_sizes() {
        let header = LocalFileHeader {
            file_name: "a.bin",
            flags: FLAG_UTF8_NAME,
            compression_method: CompressionMethod::Deflate,
            last_mod_time: 0,
            last_mod_date: 0,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            zip64: true,
        };
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), LFH_SIZE + 5 + 20);
        assert_eq!(&bytes[18..22], &ZIP64_U32_MARKER.to_le_bytes());

        let patched = LocalFileHeader {
            crc32: 0xAABB_CCDD,
            compressed_size: 6 << 30,
            uncompressed_size: 7 << 30,
            ..header
        };
        let patched_bytes = patched.to_bytes().unwrap();
        assert_eq!(patched_bytes.len(), bytes.len());
        assert_eq!(&patched_bytes[14..18], &0xAABB_CCDDu32.to_le_bytes());
        // extra field: id, size, uncompressed, compressed
        let extra = &patched_bytes[LFH_SIZE + 5..];
        assert_eq!(&extra[4..12], &(7u64 << 30).to_le_bytes());
        assert_eq!(&extra[12..20], &(6u64 << 30).to_le_bytes());
    }
}
