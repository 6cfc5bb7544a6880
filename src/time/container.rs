//! ISO-BMFF / QuickTime tag reader
//!
//! Walks the atom tree of MP4, MOV and M4V files without loading media data:
//! - `moov/mvhd` creation time (seconds since 1904-01-01 UTC)
//! - `moov/meta` and `moov/udta/meta` with `keys` + `ilst` (QuickTime metadata)
//! - iTunes freeform `----` items (`mean` / `name` / `data`)
//! - `©day`, in either the iTunes or the classic QuickTime user-data layout

use crate::error::{Error, Result};
use crate::time::parse::parse_container_datetime;
use crate::time::video::{ContainerTagReader, ContainerTags};
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::trace;

/// Seconds between the QuickTime epoch (1904) and the Unix epoch
const QT_TO_UNIX_OFFSET: i64 = 2_082_844_800;

/// Largest leaf payload read into memory
const MAX_PAYLOAD: u64 = 1024 * 1024;

/// `©day`
const DAY: [u8; 4] = [0xA9, b'd', b'a', b'y'];

/// [`ContainerTagReader`] for ISO-BMFF based containers
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp4TagReader;

impl ContainerTagReader for Mp4TagReader {
    fn read(&self, path: &Path) -> Result<ContainerTags> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        match read_tags(BufReader::new(file), len) {
            Ok(Some(tags)) => Ok(tags),
            Ok(None) => Err(Error::UnsupportedContainer {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(Error::VideoMetadata {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }
}

/// Read tags from an ISO-BMFF stream; `None` when there is no `moov` atom.
pub fn read_tags<R: Read + Seek>(reader: R, len: u64) -> io::Result<Option<ContainerTags>> {
    AtomReader { inner: reader, len }.read_tags()
}

/// Payload range of one atom
#[derive(Debug, Clone, Copy)]
struct Atom {
    kind: [u8; 4],
    start: u64,
    end: u64,
}

struct AtomReader<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> AtomReader<R> {
    fn read_tags(&mut self) -> io::Result<Option<ContainerTags>> {
        let Some(moov) = self.find(0, self.len, *b"moov")? else {
            return Ok(None);
        };

        let mut tags = ContainerTags::new();
        let mut day: Option<String> = None;

        for atom in self.children(moov.start, moov.end)? {
            match &atom.kind {
                b"mvhd" => tags.date_tagged = self.mvhd_creation_time(&atom)?,
                b"meta" => self.read_meta(&atom, &mut tags, &mut day)?,
                b"udta" => {
                    for child in self.children(atom.start, atom.end)? {
                        if &child.kind == b"meta" {
                            self.read_meta(&child, &mut tags, &mut day)?;
                        } else if child.kind == DAY && day.is_none() {
                            day = self.user_data_text(&child)?;
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(day) = day {
            trace!(day = %day, "Found ©day");
            tags.year = leading_year(&day);
            if tags.date_tagged.is_none() && day.trim().len() > 4 {
                tags.date_tagged = parse_container_datetime(&day);
            }
        }

        Ok(Some(tags))
    }

    /// List the direct children inside `[start, end)`.
    ///
    /// A malformed header ends the listing instead of failing it.
    fn children(&mut self, start: u64, end: u64) -> io::Result<Vec<Atom>> {
        let mut atoms = Vec::new();
        let mut offset = start;

        while offset + 8 <= end {
            self.inner.seek(SeekFrom::Start(offset))?;
            let mut header = [0u8; 8];
            self.inner.read_exact(&mut header)?;

            let mut size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
            let kind = [header[4], header[5], header[6], header[7]];
            let mut header_len = 8u64;

            if size == 1 {
                if offset + 16 > end {
                    break;
                }
                let mut large = [0u8; 8];
                self.inner.read_exact(&mut large)?;
                size = u64::from_be_bytes(large);
                header_len = 16;
            } else if size == 0 {
                size = end - offset;
            }
            if size < header_len {
                break;
            }

            let atom_end = offset.saturating_add(size).min(end);
            atoms.push(Atom {
                kind,
                start: offset + header_len,
                end: atom_end,
            });
            offset = atom_end;
        }

        Ok(atoms)
    }

    fn find(&mut self, start: u64, end: u64, kind: [u8; 4]) -> io::Result<Option<Atom>> {
        Ok(self
            .children(start, end)?
            .into_iter()
            .find(|atom| atom.kind == kind))
    }

    fn payload(&mut self, atom: &Atom) -> io::Result<Vec<u8>> {
        let len = atom.end.saturating_sub(atom.start).min(MAX_PAYLOAD);
        self.inner.seek(SeekFrom::Start(atom.start))?;
        let mut buf = vec![0u8; len as usize];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn mvhd_creation_time(&mut self, mvhd: &Atom) -> io::Result<Option<NaiveDateTime>> {
        let data = self.payload(mvhd)?;
        // Version 1 stores 64-bit times
        let seconds = match data.first() {
            Some(1) if data.len() >= 12 => {
                u64::from_be_bytes(data[4..12].try_into().unwrap_or_default())
            }
            Some(_) if data.len() >= 8 => {
                u32::from_be_bytes(data[4..8].try_into().unwrap_or_default()) as u64
            }
            _ => return Ok(None),
        };
        Ok(quicktime_seconds_to_local(seconds))
    }

    fn read_meta(
        &mut self,
        meta: &Atom,
        tags: &mut ContainerTags,
        day: &mut Option<String>,
    ) -> io::Result<()> {
        // iTunes-style meta is a full box; QuickTime-style starts with hdlr directly
        let mut head = [0u8; 8];
        if meta.end.saturating_sub(meta.start) < 8 {
            return Ok(());
        }
        self.inner.seek(SeekFrom::Start(meta.start))?;
        self.inner.read_exact(&mut head)?;
        let start = if &head[4..8] == b"hdlr" {
            meta.start
        } else {
            meta.start + 4
        };

        let children = self.children(start, meta.end)?;
        let keys = match children.iter().find(|atom| &atom.kind == b"keys") {
            Some(keys) => self.read_keys(keys)?,
            None => Vec::new(),
        };

        let Some(ilst) = children.iter().find(|atom| &atom.kind == b"ilst") else {
            return Ok(());
        };

        for item in self.children(ilst.start, ilst.end)? {
            if &item.kind == b"----" {
                self.read_freeform(&item, tags)?;
            } else if item.kind == DAY {
                if day.is_none() {
                    *day = self.data_text(&item)?;
                }
            } else {
                let index = u32::from_be_bytes(item.kind) as usize;
                let Some(key) = index.checked_sub(1).and_then(|i| keys.get(i)) else {
                    continue;
                };
                if let Some((namespace, name)) = key.rsplit_once('.')
                    && let Some(value) = self.data_text(&item)?
                {
                    tags.insert_dash_box(namespace, name, value);
                }
            }
        }

        Ok(())
    }

    /// Key names of a QuickTime `keys` atom, in index order
    fn read_keys(&mut self, keys: &Atom) -> io::Result<Vec<String>> {
        let data = self.payload(keys)?;
        let mut names = Vec::new();
        if data.len() < 8 {
            return Ok(names);
        }

        let count = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let mut offset = 8usize;
        for _ in 0..count {
            if offset + 8 > data.len() {
                break;
            }
            let size = u32::from_be_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]) as usize;
            if size < 8 || offset + size > data.len() {
                break;
            }
            names.push(String::from_utf8_lossy(&data[offset + 8..offset + size]).into_owned());
            offset += size;
        }

        Ok(names)
    }

    fn read_freeform(&mut self, item: &Atom, tags: &mut ContainerTags) -> io::Result<()> {
        let mut mean = None;
        let mut name = None;
        let mut value = None;

        for child in self.children(item.start, item.end)? {
            match &child.kind {
                b"mean" => mean = Some(self.full_box_text(&child)?),
                b"name" => name = Some(self.full_box_text(&child)?),
                b"data" if value.is_none() => value = self.data_payload_text(&child)?,
                _ => {}
            }
        }

        if let (Some(mean), Some(name), Some(value)) = (mean, name, value) {
            tags.insert_dash_box(mean, name, value);
        }
        Ok(())
    }

    /// Text of the first `data` child of an `ilst` item
    fn data_text(&mut self, item: &Atom) -> io::Result<Option<String>> {
        match self.find(item.start, item.end, *b"data")? {
            Some(data) => self.data_payload_text(&data),
            None => Ok(None),
        }
    }

    /// `data` atom: 1 byte version, 3 byte type, 4 byte locale, value
    fn data_payload_text(&mut self, data: &Atom) -> io::Result<Option<String>> {
        let payload = self.payload(data)?;
        if payload.len() < 8 {
            return Ok(None);
        }
        let well_known_type = u32::from_be_bytes([0, payload[1], payload[2], payload[3]]);
        // 0 = implicit, 1 = UTF-8
        if well_known_type > 1 {
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&payload[8..])
                .trim_end_matches('\0')
                .to_string(),
        ))
    }

    fn full_box_text(&mut self, atom: &Atom) -> io::Result<String> {
        let payload = self.payload(atom)?;
        Ok(String::from_utf8_lossy(payload.get(4..).unwrap_or_default()).into_owned())
    }

    /// Classic QuickTime user data text: 2 byte length, 2 byte language, text
    fn user_data_text(&mut self, atom: &Atom) -> io::Result<Option<String>> {
        let payload = self.payload(atom)?;
        if payload.len() >= 8 && &payload[4..8] == b"data" {
            return self.data_text(atom);
        }
        if payload.len() < 4 {
            return Ok(None);
        }
        let len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
        let end = (4 + len).min(payload.len());
        Ok(Some(
            String::from_utf8_lossy(&payload[4..end])
                .trim_end_matches('\0')
                .to_string(),
        ))
    }
}

fn quicktime_seconds_to_local(seconds: u64) -> Option<NaiveDateTime> {
    if seconds == 0 {
        return None;
    }
    let unix = i64::try_from(seconds).ok()?.checked_sub(QT_TO_UNIX_OFFSET)?;
    let utc = DateTime::from_timestamp(unix, 0)?;
    Some(utc.with_timezone(&Local).naive_local())
}

fn leading_year(day: &str) -> Option<u32> {
    let digits: String = day
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok()
}
