//! [`ContainerStore`] backed by the `zip` crate
//!
//! A session decodes the whole image into memory, edits entries in place and
//! re-encodes on export. Removed entries leave a hole so that indices handed
//! out during the session stay valid until it closes.

use std::io::{Cursor, Read, Write};

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::store::{Compression, CompressionMethod, ContainerHandle, ContainerStore, EntryStat};
use crate::{Error, Result};

/// Stateless zip codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipStore;

impl ZipStore {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    data: Vec<u8>,
    mtime: DateTime<Utc>,
    crc: u32,
    compressed_size: Option<u64>,
    compression: Compression,
}

/// Open session on a zip image.
#[derive(Debug, Default)]
pub struct ZipHandle {
    slots: Vec<Option<Slot>>,
}

fn to_zip_method(method: CompressionMethod) -> zip::CompressionMethod {
    match method {
        CompressionMethod::Stored => zip::CompressionMethod::Stored,
        CompressionMethod::Deflated => zip::CompressionMethod::Deflated,
        CompressionMethod::Zstd => zip::CompressionMethod::Zstd,
    }
}

fn from_zip_method(method: zip::CompressionMethod) -> CompressionMethod {
    match method {
        zip::CompressionMethod::Stored => CompressionMethod::Stored,
        zip::CompressionMethod::Zstd => CompressionMethod::Zstd,
        _ => CompressionMethod::Deflated,
    }
}

/// Zip timestamps have two-second resolution and no zone; we read them as UTC.
/// Values outside the DOS range (1980..=2107) collapse to 1980-01-01.
fn to_zip_time(mtime: DateTime<Utc>) -> zip::DateTime {
    let year = mtime.year();
    if !(1980..=2107).contains(&year) {
        return zip::DateTime::default();
    }
    zip::DateTime::from_date_and_time(
        year as u16,
        mtime.month() as u8,
        mtime.day() as u8,
        mtime.hour() as u8,
        mtime.minute() as u8,
        mtime.second() as u8,
    )
    .unwrap_or_default()
}

fn from_zip_time(time: zip::DateTime) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(time.year() as i32, time.month() as u32, time.day() as u32)
        .and_then(|d| d.and_hms_opt(time.hour() as u32, time.minute() as u32, time.second() as u32))
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}

/// Round a timestamp to what the zip format can represent.
fn zip_resolution(mtime: DateTime<Utc>) -> DateTime<Utc> {
    from_zip_time(to_zip_time(mtime))
}

impl ContainerStore for ZipStore {
    type Handle = ZipHandle;

    fn open(&self, image: &[u8]) -> Result<ZipHandle> {
        if image.is_empty() {
            return Ok(ZipHandle::default());
        }

        let mut archive = ZipArchive::new(Cursor::new(image))?;
        let mut slots = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            slots.push(Some(Slot {
                name: file.name().to_string(),
                data,
                mtime: from_zip_time(file.last_modified()),
                crc: file.crc32(),
                compressed_size: Some(file.compressed_size()),
                compression: Compression::new(from_zip_method(file.compression()), None),
            }));
        }
        Ok(ZipHandle { slots })
    }
}

impl ZipHandle {
    fn slot(&self, index: u64) -> Result<&Slot> {
        self.slots
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::codec(format!("no live entry at index {}", index)))
    }

    fn slot_mut(&mut self, index: u64) -> Result<&mut Slot> {
        self.slots
            .get_mut(index as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::codec(format!("no live entry at index {}", index)))
    }

    fn name_taken(&self, name: &str) -> bool {
        self.slots.iter().flatten().any(|s| s.name == name)
    }
}

impl ContainerHandle for ZipHandle {
    fn list(&self) -> Vec<(String, u64)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (s.name.clone(), i as u64)))
            .collect()
    }

    fn read_entry(&self, index: u64) -> Result<Vec<u8>> {
        Ok(self.slot(index)?.data.clone())
    }

    fn add_entry(&mut self, name: &str, data: Vec<u8>, mtime: DateTime<Utc>) -> Result<u64> {
        if self.name_taken(name) {
            return Err(Error::codec(format!("entry '{}' already exists", name)));
        }
        if name.ends_with('/') && !data.is_empty() {
            return Err(Error::codec(format!("directory entry '{}' cannot hold data", name)));
        }

        self.slots.push(Some(Slot {
            name: name.to_string(),
            crc: crc32fast::hash(&data),
            data,
            mtime: zip_resolution(mtime),
            compressed_size: None,
            compression: Compression::default(),
        }));
        Ok((self.slots.len() - 1) as u64)
    }

    fn replace_entry(&mut self, index: u64, data: Vec<u8>, mtime: DateTime<Utc>) -> Result<()> {
        let slot = self.slot_mut(index)?;
        if slot.name.ends_with('/') {
            return Err(Error::codec(format!("cannot replace directory entry '{}'", slot.name)));
        }
        slot.crc = crc32fast::hash(&data);
        slot.data = data;
        slot.mtime = zip_resolution(mtime);
        slot.compressed_size = None;
        Ok(())
    }

    fn delete_entry(&mut self, index: u64) -> Result<()> {
        self.slot(index)?;
        self.slots[index as usize] = None;
        Ok(())
    }

    fn rename_entry(&mut self, index: u64, name: &str) -> Result<()> {
        if self.name_taken(name) {
            return Err(Error::codec(format!("entry '{}' already exists", name)));
        }
        self.slot_mut(index)?.name = name.to_string();
        Ok(())
    }

    fn stat_entry(&self, index: u64) -> Result<EntryStat> {
        let slot = self.slot(index)?;
        Ok(EntryStat {
            size: slot.data.len() as u64,
            mtime: slot.mtime,
            crc: slot.crc,
            compressed_size: slot.compressed_size,
            compression: slot.compression.method,
        })
    }

    fn set_mtime(&mut self, index: u64, mtime: DateTime<Utc>) -> Result<()> {
        self.slot_mut(index)?.mtime = zip_resolution(mtime);
        Ok(())
    }

    fn set_compression(&mut self, index: u64, compression: Compression) -> Result<()> {
        let slot = self.slot_mut(index)?;
        if slot.compression != compression {
            slot.compression = compression;
            slot.compressed_size = None;
        }
        Ok(())
    }

    fn export(self) -> Result<Vec<u8>> {
        let live: Vec<Slot> = self.slots.into_iter().flatten().collect();
        if live.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for slot in live {
            let options = FileOptions::default()
                .compression_method(to_zip_method(slot.compression.method))
                .compression_level(slot.compression.level)
                .last_modified_time(to_zip_time(slot.mtime));
            if slot.name.ends_with('/') {
                writer.add_directory(slot.name.as_str(), options)?;
            } else {
                writer.start_file(slot.name.as_str(), options)?;
                writer.write_all(&slot.data)?;
            }
        }
        Ok(writer.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, 26, 10, 0, secs).unwrap()
    }

    #[test]
    fn supported_levels_export_and_unsupported_are_flagged() {
        for compression in [
            Compression::new(CompressionMethod::Deflated, Some(0)),
            Compression::new(CompressionMethod::Deflated, Some(9)),
            Compression::new(CompressionMethod::Zstd, Some(22)),
            Compression::new(CompressionMethod::Stored, None),
        ] {
            assert!(compression.is_supported(), "{compression:?}");
            let mut handle = ZipStore.open(&[]).unwrap();
            let index = handle.add_entry("f", b"data".to_vec(), t(0)).unwrap();
            handle.set_compression(index, compression).unwrap();
            assert!(handle.export().is_ok(), "{compression:?}");
        }

        assert!(!Compression::new(CompressionMethod::Stored, Some(1)).is_supported());
        assert!(!Compression::new(CompressionMethod::Deflated, Some(10)).is_supported());
        assert!(!Compression::new(CompressionMethod::Zstd, Some(23)).is_supported());
    }

    #[test]
    fn empty_image_is_empty_container() {
        let handle = ZipStore.open(&[]).unwrap();
        assert!(handle.list().is_empty());
        assert!(handle.export().unwrap().is_empty());
    }

    #[test]
    fn export_then_reopen_preserves_entries() {
        let mut handle = ZipStore.open(&[]).unwrap();
        handle.add_entry("a/", Vec::new(), t(0)).unwrap();
        handle.add_entry("a/b.txt", b"hi".to_vec(), t(4)).unwrap();
        let image = handle.export().unwrap();

        let reopened = ZipStore.open(&image).unwrap();
        let names: Vec<String> = reopened.list().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a/", "a/b.txt"]);
        assert_eq!(reopened.read_entry(1).unwrap(), b"hi");
        let stat = reopened.stat_entry(1).unwrap();
        assert_eq!(stat.size, 2);
        assert_eq!(stat.mtime, t(4));
        assert_eq!(stat.crc, crc32fast::hash(b"hi"));
        assert!(stat.compressed_size.is_some());
    }

    #[test]
    fn mtime_is_rounded_to_zip_resolution() {
        let mut handle = ZipStore.open(&[]).unwrap();
        let index = handle.add_entry("x", Vec::new(), t(7)).unwrap();
        assert_eq!(handle.stat_entry(index).unwrap().mtime, t(6));
    }

    #[test]
    fn deleted_slots_keep_other_indices_stable() {
        let mut handle = ZipStore.open(&[]).unwrap();
        let a = handle.add_entry("a", b"1".to_vec(), t(0)).unwrap();
        let b = handle.add_entry("b", b"2".to_vec(), t(0)).unwrap();
        handle.delete_entry(a).unwrap();

        assert_eq!(handle.list(), vec![("b".to_string(), b)]);
        assert!(handle.read_entry(a).is_err());
        assert!(handle.delete_entry(a).is_err());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut handle = ZipStore.open(&[]).unwrap();
        handle.add_entry("a", Vec::new(), t(0)).unwrap();
        let b = handle.add_entry("b", Vec::new(), t(0)).unwrap();
        assert!(handle.add_entry("a", Vec::new(), t(0)).is_err());
        assert!(handle.rename_entry(b, "a").is_err());
    }

    #[test]
    fn out_of_range_years_collapse_to_dos_epoch() {
        let old = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(1980, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(zip_resolution(old), expected);
    }
}
