use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use RosterDB::{CompositeKey, Dictionary, LogonOutcome, Roster, RosterConfig};

#[test]
fn duplicate_logon_is_rejected_until_disconnect() -> Result<()> {
    let root = unique_root("dup");
    fs::create_dir_all(&root)?;
    let store = root.join("sessions.ros");

    let key = CompositeKey::new("INITIATOR", "ACCEPTOR");
    let dict = Dictionary::named("FIX.4.4");

    let mut roster = Roster::open(RosterConfig::new(&store).capacity(4 * 4096))?;
    let ctx = roster
        .on_logon(key.clone(), dict.clone())
        .granted()
        .expect("first logon");
    assert_eq!(ctx.session_id, 1);

    let before = fs::read(&store)?;

    // повторный logon без disconnect — отказ, запись на диске не тронута
    let second = roster.on_logon(key.clone(), dict.clone());
    assert!(second.is_duplicate());
    assert!(matches!(second, LogonOutcome::Duplicate));
    let after = fs::read(&store)?;
    assert_eq!(before, after, "duplicate logon must not touch the store");

    // disconnect идемпотентен; после него ключ снова logon'ится с тем же id
    roster.on_disconnect(1);
    roster.on_disconnect(1);
    assert!(!roster.is_authenticated(1));
    assert!(roster.is_known_session_id(1), "identity survives disconnect");

    let again = roster
        .on_logon(key.clone(), dict.clone())
        .granted()
        .expect("relogon after disconnect");
    assert_eq!(again.session_id, 1, "same key keeps its id forever");

    Ok(())
}

#[test]
fn auth_set_is_bounded_by_known_ids_and_readable_concurrently() -> Result<()> {
    let root = unique_root("auth");
    fs::create_dir_all(&root)?;
    let store = root.join("sessions.ros");

    let dict = Dictionary::named("FIX.4.4");
    let mut roster = Roster::open(RosterConfig::new(&store).capacity(4 * 4096))?;

    for name in ["A", "B", "C"] {
        roster
            .on_logon(CompositeKey::new(name, "ACC"), dict.clone())
            .granted()
            .expect("grant");
    }
    roster.on_disconnect(2);

    // authenticated ⊆ known
    let auth = roster.auth_view();
    for id in auth.to_vec() {
        assert!(roster.is_known_session_id(id));
    }
    assert_eq!(auth.len(), 2);

    // membership-тесты из другого потока, пока владелец мутирует
    let view = roster.auth_view();
    let sessions = roster.sessions_view();
    let reader = std::thread::spawn(move || {
        let mut seen_authenticated = false;
        for _ in 0..10_000 {
            if view.contains(1) {
                seen_authenticated = true;
            }
            let _ = sessions.snapshot().len();
        }
        seen_authenticated
    });

    for round in 0..100u64 {
        let key = CompositeKey::new(format!("T{}", round), "ACC");
        roster.on_logon(key, dict.clone()).granted().expect("grant");
    }
    assert!(reader.join().unwrap(), "reader must observe session 1");

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
