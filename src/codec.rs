//! codec — раскладка file header'а и записей session-store.
//!
//! Движок владеет фреймингом (секторы, CRC); раскладку полей записи он
//! делегирует внедряемому кодеку. Контракт с движком минимален:
//! - decode по нулевым байтам обязан дать session_id == 0 (пустой слот);
//! - encode/patch не выходят за выданный фреймером диапазон.
//!
//! SessionRecordCodec — дефолтная раскладка (см. consts.rs):
//! header [block_length u16][template_id u16][schema_id u16][version u16],
//! запись: fixed prefix (BLOCK_LENGTH) + [dict_name_len u16][dict_name] +
//! composite key blob.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    BLOCK_LENGTH, HDR_OFF_BLOCK_LENGTH, HDR_OFF_SCHEMA_ID, HDR_OFF_SCHEMA_VERSION,
    HDR_OFF_TEMPLATE_ID, HEADER_SIZE, REC_OFF_KEY_LENGTH, REC_OFF_LAST_RESET_TIME,
    REC_OFF_LOGON_TIME, REC_OFF_SEQUENCE_INDEX, REC_OFF_SESSION_ID, SCHEMA_ID, SCHEMA_VERSION,
    TEMPLATE_ID,
};

/// Разобранный file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileHeader {
    pub block_length: u16,
    pub template_id: u16,
    pub schema_id: u16,
    pub schema_version: u16,
}

impl FileHeader {
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.block_length == 0
            && self.template_id == 0
            && self.schema_id == 0
            && self.schema_version == 0
    }
}

/// Поля одной записи (fixed prefix + имя словаря из var-части).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: u64,
    pub sequence_index: i32,
    pub logon_time: i64,
    pub last_sequence_reset_time: i64,
    pub composite_key_length: u16,
    pub dictionary_name: String,
}

/// Внедряемая раскладка записи. Движку нужны константы схемы, encode/decode
/// и точечный patch трёх мутабельных полей по известному смещению.
pub trait RecordCodec: Send {
    fn block_length(&self) -> u16;
    fn schema_id(&self) -> u16;
    fn template_id(&self) -> u16;
    fn schema_version(&self) -> u16;

    fn write_file_header(&self, buf: &mut [u8]);
    fn read_file_header(&self, buf: &[u8]) -> FileHeader;

    /// Полная длина записи на диске (fixed prefix + var-часть + blob ключа).
    /// Движок выдаёт фреймером ровно столько, чтобы запись не пересекла
    /// границу данных сектора.
    fn record_length(&self, dictionary_name: &str, composite_key_length: usize) -> usize;

    /// Закодировать запись по offset. Возвращает limit — смещение сразу за
    /// var-частью имени словаря; blob ключа вызывающий кладёт с limit.
    fn encode_at(&self, buf: &mut [u8], offset: usize, rec: &SessionRecord) -> Result<usize>;

    /// Разобрать запись по offset с учётом block_length/version из header'а
    /// файла. Возвращает (запись, limit); blob ключа лежит с limit.
    fn decode_at(
        &self,
        buf: &[u8],
        offset: usize,
        acting_block_length: u16,
        acting_version: u16,
    ) -> Result<(SessionRecord, usize)>;

    /// Переписать на месте три мутабельных поля fixed prefix'а.
    fn patch_saved_fields(
        &self,
        buf: &mut [u8],
        offset: usize,
        sequence_index: i32,
        logon_time: i64,
        last_sequence_reset_time: i64,
    ) -> Result<()>;
}

/// Дефолтный кодек session-store (раскладка из consts.rs).
#[derive(Debug, Default)]
pub struct SessionRecordCodec;

impl RecordCodec for SessionRecordCodec {
    fn block_length(&self) -> u16 {
        BLOCK_LENGTH
    }

    fn schema_id(&self) -> u16 {
        SCHEMA_ID
    }

    fn template_id(&self) -> u16 {
        TEMPLATE_ID
    }

    fn schema_version(&self) -> u16 {
        SCHEMA_VERSION
    }

    fn write_file_header(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        LittleEndian::write_u16(&mut buf[HDR_OFF_BLOCK_LENGTH..], BLOCK_LENGTH);
        LittleEndian::write_u16(&mut buf[HDR_OFF_TEMPLATE_ID..], TEMPLATE_ID);
        LittleEndian::write_u16(&mut buf[HDR_OFF_SCHEMA_ID..], SCHEMA_ID);
        LittleEndian::write_u16(&mut buf[HDR_OFF_SCHEMA_VERSION..], SCHEMA_VERSION);
    }

    fn read_file_header(&self, buf: &[u8]) -> FileHeader {
        debug_assert!(buf.len() >= HEADER_SIZE);
        FileHeader {
            block_length: LittleEndian::read_u16(&buf[HDR_OFF_BLOCK_LENGTH..]),
            template_id: LittleEndian::read_u16(&buf[HDR_OFF_TEMPLATE_ID..]),
            schema_id: LittleEndian::read_u16(&buf[HDR_OFF_SCHEMA_ID..]),
            schema_version: LittleEndian::read_u16(&buf[HDR_OFF_SCHEMA_VERSION..]),
        }
    }

    fn record_length(&self, dictionary_name: &str, composite_key_length: usize) -> usize {
        BLOCK_LENGTH as usize + 2 + dictionary_name.len() + composite_key_length
    }

    fn encode_at(&self, buf: &mut [u8], offset: usize, rec: &SessionRecord) -> Result<usize> {
        let name = rec.dictionary_name.as_bytes();
        if name.len() > u16::MAX as usize {
            return Err(anyhow!("dictionary name too long: {} bytes", name.len()));
        }
        let total = BLOCK_LENGTH as usize + 2 + name.len();
        if offset + total > buf.len() {
            return Err(anyhow!(
                "record encode out of bounds: offset {} + {} > {}",
                offset,
                total,
                buf.len()
            ));
        }

        let p = &mut buf[offset..];
        LittleEndian::write_u64(&mut p[REC_OFF_SESSION_ID..], rec.session_id);
        LittleEndian::write_i32(&mut p[REC_OFF_SEQUENCE_INDEX..], rec.sequence_index);
        LittleEndian::write_i64(&mut p[REC_OFF_LOGON_TIME..], rec.logon_time);
        LittleEndian::write_i64(&mut p[REC_OFF_LAST_RESET_TIME..], rec.last_sequence_reset_time);
        LittleEndian::write_u16(&mut p[REC_OFF_KEY_LENGTH..], rec.composite_key_length);

        let var = BLOCK_LENGTH as usize;
        LittleEndian::write_u16(&mut p[var..], name.len() as u16);
        p[var + 2..var + 2 + name.len()].copy_from_slice(name);

        Ok(offset + total)
    }

    fn decode_at(
        &self,
        buf: &[u8],
        offset: usize,
        acting_block_length: u16,
        _acting_version: u16,
    ) -> Result<(SessionRecord, usize)> {
        let block = acting_block_length as usize;
        if offset + block + 2 > buf.len() {
            return Err(anyhow!(
                "record prefix out of bounds: offset {} + {} > {}",
                offset,
                block + 2,
                buf.len()
            ));
        }

        let p = &buf[offset..];
        let session_id = LittleEndian::read_u64(&p[REC_OFF_SESSION_ID..]);
        let sequence_index = LittleEndian::read_i32(&p[REC_OFF_SEQUENCE_INDEX..]);
        let logon_time = LittleEndian::read_i64(&p[REC_OFF_LOGON_TIME..]);
        let last_sequence_reset_time = LittleEndian::read_i64(&p[REC_OFF_LAST_RESET_TIME..]);
        let composite_key_length = LittleEndian::read_u16(&p[REC_OFF_KEY_LENGTH..]);

        let name_len = LittleEndian::read_u16(&p[block..]) as usize;
        let limit = offset + block + 2 + name_len;
        if limit > buf.len() {
            return Err(anyhow!(
                "dictionary name out of bounds: {} bytes at {}",
                name_len,
                offset + block + 2
            ));
        }
        let name_bytes = &buf[offset + block + 2..limit];
        let dictionary_name = std::str::from_utf8(name_bytes)
            .map_err(|_| anyhow!("dictionary name is not valid utf-8 at {}", offset + block + 2))?
            .to_string();

        Ok((
            SessionRecord {
                session_id,
                sequence_index,
                logon_time,
                last_sequence_reset_time,
                composite_key_length,
                dictionary_name,
            },
            limit,
        ))
    }

    fn patch_saved_fields(
        &self,
        buf: &mut [u8],
        offset: usize,
        sequence_index: i32,
        logon_time: i64,
        last_sequence_reset_time: i64,
    ) -> Result<()> {
        if offset + BLOCK_LENGTH as usize > buf.len() {
            return Err(anyhow!(
                "record patch out of bounds: offset {} + {} > {}",
                offset,
                BLOCK_LENGTH,
                buf.len()
            ));
        }
        let p = &mut buf[offset..];
        LittleEndian::write_i32(&mut p[REC_OFF_SEQUENCE_INDEX..], sequence_index);
        LittleEndian::write_i64(&mut p[REC_OFF_LOGON_TIME..], logon_time);
        LittleEndian::write_i64(&mut p[REC_OFF_LAST_RESET_TIME..], last_sequence_reset_time);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{UNKNOWN_SEQUENCE_INDEX, UNKNOWN_TIME};

    #[test]
    fn header_roundtrip_and_zero_detection() {
        let codec = SessionRecordCodec;
        let mut buf = vec![0u8; HEADER_SIZE];
        assert!(codec.read_file_header(&buf).is_zero());

        codec.write_file_header(&mut buf);
        let hdr = codec.read_file_header(&buf);
        assert!(!hdr.is_zero());
        assert_eq!(hdr.block_length, BLOCK_LENGTH);
        assert_eq!(hdr.schema_id, SCHEMA_ID);
        assert_eq!(hdr.template_id, TEMPLATE_ID);
        assert_eq!(hdr.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn decode_of_zeroed_region_is_empty_slot() {
        let codec = SessionRecordCodec;
        let buf = vec![0u8; 128];
        let (rec, limit) = codec.decode_at(&buf, 8, BLOCK_LENGTH, SCHEMA_VERSION).unwrap();
        assert_eq!(rec.session_id, 0);
        assert_eq!(rec.dictionary_name, "");
        assert_eq!(limit, 8 + BLOCK_LENGTH as usize + 2);
    }

    #[test]
    fn encode_decode_patch() {
        let codec = SessionRecordCodec;
        let mut buf = vec![0u8; 256];
        let rec = SessionRecord {
            session_id: 9,
            sequence_index: UNKNOWN_SEQUENCE_INDEX,
            logon_time: UNKNOWN_TIME,
            last_sequence_reset_time: UNKNOWN_TIME,
            composite_key_length: 17,
            dictionary_name: "FIX.4.4".to_string(),
        };
        let limit = codec.encode_at(&mut buf, 8, &rec).unwrap();
        assert_eq!(limit, 8 + 30 + 2 + 7);

        let (got, got_limit) = codec.decode_at(&buf, 8, BLOCK_LENGTH, SCHEMA_VERSION).unwrap();
        assert_eq!(got, rec);
        assert_eq!(got_limit, limit);

        codec
            .patch_saved_fields(&mut buf, 8, 2, 1_700_000_000_000, 1_700_000_000_500)
            .unwrap();
        let (patched, _) = codec.decode_at(&buf, 8, BLOCK_LENGTH, SCHEMA_VERSION).unwrap();
        assert_eq!(patched.sequence_index, 2);
        assert_eq!(patched.logon_time, 1_700_000_000_000);
        assert_eq!(patched.last_sequence_reset_time, 1_700_000_000_500);
        // немутабельные поля не тронуты
        assert_eq!(patched.session_id, 9);
        assert_eq!(patched.dictionary_name, "FIX.4.4");
    }

    #[test]
    fn decode_rejects_runaway_name_length() {
        let codec = SessionRecordCodec;
        let mut buf = vec![0u8; 64];
        // name_len за пределами буфера
        LittleEndian::write_u16(&mut buf[8 + BLOCK_LENGTH as usize..], 5000);
        assert!(codec.decode_at(&buf, 8, BLOCK_LENGTH, SCHEMA_VERSION).is_err());
    }
}
