//! mapped — владение файлом стора и его mmap-окном.
//!
//! MappedRegion:
//! - создаёт/открывает файл, доращивает до capacity и мапит его RW;
//! - даёт little-endian доступ к словам и байтовым диапазонам;
//! - force(): msync грязных страниц (выключается конфигом для бенчей);
//! - transfer_to(): снапшот всего образа в другой файл (бэкап перед reset);
//! - zero_fill(): обнуление всего окна.
//!
//! Все мутации идут через один владеющий поток; mmap-окно живёт от открытия
//! до Drop.

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::metrics::record_force;

pub struct MappedRegion {
    path: PathBuf,
    _file: std::fs::File, // держим дескриптор
    map: MmapMut,
    capacity: usize,
    // false = пропускать msync (бенчи/разработка), см. RosterConfig::force_writes
    force_enabled: bool,
}

#[cfg(unix)]
fn fsync_parent_dir(path: &Path) -> std::io::Result<()> {
    use std::fs::File;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
fn fsync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl MappedRegion {
    /// Открыть (или создать) файл стора и замапить его на capacity байт.
    /// Существующий файл короче capacity доращивается нулями; длиннее --
    /// ошибка (усечение чужого файла было бы потерей записей).
    pub fn open(path: &Path, capacity: usize, force_enabled: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open session store {}", path.display()))?;

        let len = file.metadata()?.len();
        if len > capacity as u64 {
            return Err(anyhow!(
                "session store {} is {} bytes, larger than configured capacity {}",
                path.display(),
                len,
                capacity
            ));
        }
        if len < capacity as u64 {
            file.set_len(capacity as u64)
                .with_context(|| format!("grow session store {}", path.display()))?;
        }

        // Safety: файл держится эксклюзивно (writer lock на уровне Roster),
        // длина зафиксирована выше и не меняется, пока жив mmap.
        let map = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("mmap session store {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
            map,
            capacity,
            force_enabled,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.map[..]
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.map[..]
    }

    // ---------------- word access (LE) ----------------

    #[inline]
    pub fn get_u32(&self, offset: usize) -> u32 {
        LittleEndian::read_u32(&self.map[offset..offset + 4])
    }

    #[inline]
    pub fn put_u32(&mut self, offset: usize, value: u32) {
        LittleEndian::write_u32(&mut self.map[offset..offset + 4], value);
    }

    #[inline]
    pub fn get_u64(&self, offset: usize) -> u64 {
        LittleEndian::read_u64(&self.map[offset..offset + 8])
    }

    #[inline]
    pub fn put_bytes(&mut self, offset: usize, src: &[u8]) {
        self.map[offset..offset + src.len()].copy_from_slice(src);
    }

    // ---------------- durability ----------------

    /// Синхронно сбросить грязные страницы на диск.
    /// С force_enabled=false превращается в no-op (бенчи/разработка).
    pub fn force(&self) -> Result<()> {
        if !self.force_enabled {
            return Ok(());
        }
        record_force();
        self.map
            .flush()
            .with_context(|| format!("msync {}", self.path.display()))
    }

    /// Снять копию всего образа в `dest` (бэкап перед reset).
    /// Пишем из mmap-окна: оно и есть текущее содержимое файла.
    pub fn transfer_to(&self, dest: &Path) -> Result<u64> {
        let mut out = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(dest)
            .with_context(|| format!("create backup {}", dest.display()))?;
        out.write_all(&self.map[..])
            .with_context(|| format!("write backup {}", dest.display()))?;
        out.sync_all()?;
        let _ = fsync_parent_dir(dest);
        Ok(self.capacity as u64)
    }

    /// Обнулить всё окно (reset). Не форсит — вызывающий код сам решает, когда.
    pub fn zero_fill(&mut self) {
        self.map.fill(0);
    }
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("force_enabled", &self.force_enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_path(prefix: &str) -> PathBuf {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("rdb-map-{}-{}-{}", prefix, std::process::id(), t))
    }

    #[test]
    fn open_grow_write_reopen() -> Result<()> {
        let path = unique_path("grow");
        {
            let mut r = MappedRegion::open(&path, 8192, true)?;
            assert_eq!(r.capacity(), 8192);
            r.put_u32(100, 0xAABBCCDD);
            r.put_bytes(200, b"roster");
            r.force()?;
        }
        {
            let r = MappedRegion::open(&path, 8192, true)?;
            assert_eq!(r.get_u32(100), 0xAABBCCDD);
            assert_eq!(&r.bytes()[200..206], b"roster");
        }
        // файл длиннее capacity не усекаем
        assert!(MappedRegion::open(&path, 4096, true).is_err());
        std::fs::remove_file(&path).ok();
        Ok(())
    }

    #[test]
    fn transfer_and_zero_fill() -> Result<()> {
        let path = unique_path("xfer");
        let dest = unique_path("xfer-dst");
        let mut r = MappedRegion::open(&path, 4096, true)?;
        r.put_u32(0, 42);
        let n = r.transfer_to(&dest)?;
        assert_eq!(n, 4096);
        assert_eq!(std::fs::metadata(&dest)?.len(), 4096);

        r.zero_fill();
        assert_eq!(r.get_u32(0), 0);
        // бэкап сохранил старое содержимое
        let back = std::fs::read(&dest)?;
        assert_eq!(LittleEndian::read_u32(&back[0..4]), 42);

        std::fs::remove_file(&path).ok();
        std::fs::remove_file(&dest).ok();
        Ok(())
    }
}
