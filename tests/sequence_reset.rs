use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use RosterDB::consts::{SECTOR_DATA_LENGTH, UNKNOWN_TIME};
use RosterDB::{CompositeKey, Dictionary, Roster, RosterConfig};

#[test]
fn sequence_reset_rewrites_record_in_place() -> Result<()> {
    let root = unique_root("seqreset");
    fs::create_dir_all(&root)?;
    let store = root.join("sessions.ros");

    let key = CompositeKey::new("INITIATOR", "ACCEPTOR");
    let dict = Dictionary::named("FIX.4.4");
    let reset_time = 1_700_000_111_222i64;

    {
        let mut roster = Roster::open(RosterConfig::new(&store).capacity(4 * 4096))?;
        roster.on_logon(key.clone(), dict.clone()).granted().expect("grant");

        roster.sequence_reset(1, reset_time);
        let ctx = roster.context(&key).unwrap();
        assert_eq!(ctx.last_sequence_reset_time, reset_time, "in-memory update");
        assert_eq!(ctx.last_logon_time, UNKNOWN_TIME, "logon time untouched");

        // неизвестный id молча игнорируется
        roster.sequence_reset(99, reset_time);

        // идемпотентность: повторный reset тем же временем не меняет файл
        let before = fs::read(&store)?;
        roster.sequence_reset(1, reset_time);
        assert_eq!(before, fs::read(&store)?);
    }

    // после reopen новое значение видно, CRC сектора 0 сходится
    {
        let mut roster = Roster::open(RosterConfig::new(&store).capacity(4 * 4096))?;
        let ctx = roster.context(&key).unwrap();
        assert_eq!(ctx.last_sequence_reset_time, reset_time);
        assert_eq!(ctx.session_id, 1);

        let bytes = fs::read(&store)?;
        let stored = u32::from_le_bytes(bytes[SECTOR_DATA_LENGTH..SECTOR_DATA_LENGTH + 4].try_into()?);
        let mut h = crc32fast::Hasher::new();
        h.update(&bytes[..SECTOR_DATA_LENGTH]);
        assert_eq!(stored, h.finalize());

        // update_saved_data по известному смещению: logon time + sequence index
        let logon_time = 1_700_000_333_444i64;
        roster.update_saved_data(ctx.file_position, 7, logon_time, reset_time);
        drop(roster);

        let roster = Roster::open(RosterConfig::new(&store).capacity(4 * 4096))?;
        let ctx = roster.context(&key).unwrap();
        assert_eq!(ctx.sequence_index, 7);
        assert_eq!(ctx.last_logon_time, logon_time);
        assert_eq!(ctx.last_sequence_reset_time, reset_time);
    }

    Ok(())
}

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("rdb-{}-{}-{}", prefix, pid, t))
}
