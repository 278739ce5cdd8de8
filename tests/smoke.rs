use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use RosterDB::consts::{CHECKSUM_SIZE, HEADER_SIZE, SECTOR_DATA_LENGTH};
use RosterDB::{CompositeKey, Dictionary, Roster, RosterConfig};

#[test]
fn smoke_fresh_assignment_and_queries() -> Result<()> {
    let root = unique_root("smoke");
    fs::create_dir_all(&root)?;
    let store = root.join("sessions.ros");

    let key_a = CompositeKey::new("INITIATOR", "ACCEPTOR");
    let dict = Dictionary::named("FIX.4.4");

    // 1) свежий стор: первый logon получает id 1 и запись с HEADER_SIZE
    {
        let mut roster =
            Roster::open(RosterConfig::new(&store).capacity(4 * 4096).initial_sequence_index(1))?;
        assert_eq!(roster.counter(), 1);
        assert_eq!(roster.initial_sequence_index(), 1);
        assert!(roster.all_sessions().is_empty());

        let ctx = roster
            .on_logon(key_a.clone(), dict.clone())
            .granted()
            .expect("fresh logon must be granted");
        assert_eq!(ctx.session_id, 1);
        assert_eq!(ctx.file_position, HEADER_SIZE as i32);
        assert!(ctx.is_persisted());

        assert!(roster.is_authenticated(1));
        assert!(roster.is_known_session_id(1));
        assert_eq!(roster.lookup_session_id(&key_a), Some(1));
        assert_eq!(roster.counter(), 2);

        let all = roster.all_sessions();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].session_id, 1);
        assert_eq!(all[0].key, key_a);
    }

    // 2) CRC первого сектора сходится с данными на диске
    {
        let bytes = fs::read(&store)?;
        let stored = u32::from_le_bytes(
            bytes[SECTOR_DATA_LENGTH..SECTOR_DATA_LENGTH + CHECKSUM_SIZE].try_into()?,
        );
        let calculated = {
            let mut h = crc32fast::Hasher::new();
            h.update(&bytes[..SECTOR_DATA_LENGTH]);
            h.finalize()
        };
        assert_eq!(stored, calculated, "sector 0 checksum must validate");
        assert_ne!(stored, 0);
    }

    // 3) id'ы назначаются монотонно в порядке вызовов
    {
        let mut roster = Roster::open(RosterConfig::new(&store).capacity(4 * 4096))?;
        for (i, name) in ["B", "C", "D"].iter().enumerate() {
            let ctx = roster
                .on_logon(CompositeKey::new(*name, "ACCEPTOR"), dict.clone())
                .granted()
                .expect("distinct keys must be granted");
            assert_eq!(ctx.session_id, (i + 2) as u64);
        }
        // идентичность постоянна: повторный контекст того же ключа не меняется
        let again = roster.new_session_context(key_a.clone(), dict.clone());
        assert_eq!(again.session_id, 1);
        assert_eq!(roster.counter(), 5);
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
