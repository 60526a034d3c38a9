//! Ordered key-value map persisted as an append-only record log.
//!
//! File layout: an 8-byte magic followed by records of
//! `tag:u8 | klen:u16le | vlen:u32le | key | value | crc32:u32le`,
//! where the checksum covers everything from `tag` through `value`.
//! A torn or corrupt tail is dropped on open; everything before it is kept.
//! An open log holds an exclusive lock on its file until dropped.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;

use crate::error::StoreError;

const MAGIC: &[u8; 8] = b"TSRKV001";
const TAG_PUT: u8 = 1;
const RECORD_HEAD: usize = 1 + 2 + 4;
const RECORD_TAIL: usize = 4;
const MAX_KEY: usize = u16::MAX as usize;
/// Compact on open once superseded records outnumber live ones and pass this floor.
const COMPACT_MIN_DEAD: usize = 4096;

pub struct KvLog {
    path: PathBuf,
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    writer: BufWriter<File>,
    dead: usize,
}

impl KvLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        lock(&file, &path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut map = BTreeMap::new();
        let mut dead = 0usize;
        if bytes.is_empty() {
            file.write_all(MAGIC)?;
        } else {
            if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
                return Err(StoreError::BadHeader);
            }
            let mut off = MAGIC.len();
            let mut records = 0usize;
            while off < bytes.len() {
                match decode_record(&bytes[off..]) {
                    Some((k, v, used)) => {
                        records += 1;
                        if map.insert(k, v).is_some() {
                            dead += 1;
                        }
                        off += used;
                    }
                    None => {
                        log::warn!(
                            target: "store",
                            "{}: dropping {} trailing bytes after record {}",
                            path.display(),
                            bytes.len() - off,
                            records
                        );
                        file.set_len(off as u64)?;
                        break;
                    }
                }
            }
        }
        file.seek(SeekFrom::End(0))?;

        let mut kv = Self {
            path,
            map,
            writer: BufWriter::new(file),
            dead,
        };
        if kv.dead >= COMPACT_MIN_DEAD && kv.dead > kv.map.len() {
            kv.compact()?;
        }
        log::debug!(
            target: "store",
            "opened {} ({} live keys, {} dead records)",
            kv.path.display(),
            kv.map.len(),
            kv.dead
        );
        Ok(kv)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(Vec::as_slice)
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        if key.len() > MAX_KEY {
            return Err(StoreError::KeyTooLong(key.len()));
        }
        write_record(&mut self.writer, TAG_PUT, key, value)?;
        if self.map.insert(key.to_vec(), value.to_vec()).is_some() {
            self.dead += 1;
        }
        Ok(())
    }

    /// Entries whose key starts with `prefix`, in key order.
    pub fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.map
            .range(prefix.to_vec()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes buffered records and fsyncs the file.
    pub fn sync(&mut self) -> Result<(), StoreError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Rewrites the live set into a fresh file and swaps it in. The fresh file is locked
    /// before it replaces the old one.
    pub fn compact(&mut self) -> Result<(), StoreError> {
        self.writer.flush()?;
        let tmp = self.path.with_extension("compact");
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        lock(&file, &tmp)?;
        {
            let mut w = BufWriter::new(&mut file);
            w.write_all(MAGIC)?;
            for (k, v) in &self.map {
                write_record(&mut w, TAG_PUT, k, v)?;
            }
            w.flush()?;
        }
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        file.seek(SeekFrom::End(0))?;
        self.writer = BufWriter::new(file);
        log::info!(
            target: "store",
            "compacted {}: dropped {} dead records",
            self.path.display(),
            self.dead
        );
        self.dead = 0;
        Ok(())
    }
}

impl Drop for KvLog {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!(target: "store", "flush on drop failed for {}: {e}", self.path.display());
        }
    }
}

fn lock(file: &File, path: &Path) -> Result<(), StoreError> {
    match file.try_lock() {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(StoreError::Locked(path.to_path_buf())),
        Err(TryLockError::Error(e)) => Err(StoreError::Io(e)),
    }
}

fn checksum(parts: &[&[u8]]) -> u32 {
    let mut hasher = Hasher::new();
    for p in parts {
        hasher.update(p);
    }
    hasher.finalize()
}

fn write_record(w: &mut impl Write, tag: u8, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
    let mut head = [0u8; RECORD_HEAD];
    head[0] = tag;
    head[1..3].copy_from_slice(&(key.len() as u16).to_le_bytes());
    head[3..7].copy_from_slice(&(value.len() as u32).to_le_bytes());
    let crc = checksum(&[&head[..], key, value]);
    w.write_all(&head)?;
    w.write_all(key)?;
    w.write_all(value)?;
    w.write_all(&crc.to_le_bytes())?;
    Ok(())
}

fn decode_record(buf: &[u8]) -> Option<(Vec<u8>, Vec<u8>, usize)> {
    if buf.len() < RECORD_HEAD {
        return None;
    }
    if buf[0] != TAG_PUT {
        return None;
    }
    let klen = u16::from_le_bytes([buf[1], buf[2]]) as usize;
    let vlen = u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]) as usize;
    let body_end = RECORD_HEAD.checked_add(klen)?.checked_add(vlen)?;
    let total = body_end.checked_add(RECORD_TAIL)?;
    if buf.len() < total {
        return None;
    }
    let stored = u32::from_le_bytes([
        buf[body_end],
        buf[body_end + 1],
        buf[body_end + 2],
        buf[body_end + 3],
    ]);
    if checksum(&[&buf[..body_end]]) != stored {
        return None;
    }
    let key = buf[RECORD_HEAD..RECORD_HEAD + klen].to_vec();
    let value = buf[RECORD_HEAD + klen..body_end].to_vec();
    Some((key, value, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static SERIAL: AtomicU64 = AtomicU64::new(0);

    fn scratch(name: &str) -> PathBuf {
        let n = SERIAL.fetch_add(1, Ordering::Relaxed);
        let mut p = std::env::temp_dir();
        p.push(format!("tessera-kvlog-{name}-{}-{n}.db", std::process::id()));
        let _ = fs::remove_file(&p);
        p
    }

    #[test]
    fn last_put_wins_after_reopen() {
        let path = scratch("reopen");
        {
            let mut log = KvLog::open(&path).unwrap();
            log.put(b"a", b"1").unwrap();
            log.put(b"b", b"2").unwrap();
            log.put(b"a", b"3").unwrap();
        }
        let log = KvLog::open(&path).unwrap();
        assert_eq!(log.get(b"a"), Some(&b"3"[..]));
        assert_eq!(log.get(b"b"), Some(&b"2"[..]));
        assert_eq!(log.len(), 2);
        assert_eq!(log.dead, 1);
        drop(log);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn torn_tail_is_dropped() {
        let path = scratch("torn");
        {
            let mut log = KvLog::open(&path).unwrap();
            log.put(b"keep", b"yes").unwrap();
            log.put(b"lost", b"partial").unwrap();
        }
        let len = fs::metadata(&path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 3)
            .unwrap();
        {
            let mut log = KvLog::open(&path).unwrap();
            assert_eq!(log.get(b"keep"), Some(&b"yes"[..]));
            assert_eq!(log.get(b"lost"), None);
            log.put(b"after", b"ok").unwrap();
        }
        let log = KvLog::open(&path).unwrap();
        assert_eq!(log.get(b"after"), Some(&b"ok"[..]));
        drop(log);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let path = scratch("magic");
        fs::write(&path, b"NOTAKVLOG").unwrap();
        assert!(matches!(KvLog::open(&path), Err(StoreError::BadHeader)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compaction_keeps_live_set() {
        let path = scratch("compact");
        {
            let mut log = KvLog::open(&path).unwrap();
            for i in 0..50u32 {
                log.put(b"hot", &i.to_le_bytes()).unwrap();
            }
            log.put(b"cold", b"x").unwrap();
            let before = {
                log.flush().unwrap();
                fs::metadata(&path).unwrap().len()
            };
            log.compact().unwrap();
            assert!(fs::metadata(&path).unwrap().len() < before);
            log.put(b"late", b"y").unwrap();
        }
        let log = KvLog::open(&path).unwrap();
        assert_eq!(log.get(b"hot"), Some(&49u32.to_le_bytes()[..]));
        assert_eq!(log.get(b"cold"), Some(&b"x"[..]));
        assert_eq!(log.get(b"late"), Some(&b"y"[..]));
        drop(log);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn second_open_is_refused_while_the_first_is_live() {
        let path = scratch("locked");
        let mut first = KvLog::open(&path).unwrap();
        first.put(b"a", b"1").unwrap();
        assert!(matches!(KvLog::open(&path), Err(StoreError::Locked(_))));
        first.compact().unwrap();
        assert!(matches!(KvLog::open(&path), Err(StoreError::Locked(_))));
        first.put(b"b", b"2").unwrap();
        drop(first);
        let log = KvLog::open(&path).unwrap();
        assert_eq!(log.get(b"a"), Some(&b"1"[..]));
        assert_eq!(log.get(b"b"), Some(&b"2"[..]));
        drop(log);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn prefix_scan_stops_at_boundary() {
        let path = scratch("scan");
        let mut log = KvLog::open(&path).unwrap();
        log.put(b"ab1", b"").unwrap();
        log.put(b"ab2", b"").unwrap();
        log.put(b"ac1", b"").unwrap();
        log.put(b"aa9", b"").unwrap();
        let keys: Vec<&[u8]> = log.scan_prefix(b"ab").map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&b"ab1"[..], &b"ab2"[..]]);
        drop(log);
        let _ = fs::remove_file(&path);
    }
}
