//! Host-directory storage against a real temporary directory.

use std::fs;
use std::time::Instant;

use tempfile::TempDir;
use tpdd_core::protocol::{encode_wire_name, OpenMode};
use tpdd_core::{
    encode_frame, Emulator, HeadlessTransport, HostStorage, Opened, Storage, TpddError,
};

fn fixture() -> (TempDir, HostStorage) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("HELLO.DO"), b"HELLO WORLD").unwrap();
    fs::write(dir.path().join(".hidden"), b"secret").unwrap();
    fs::create_dir(dir.path().join("GAMES")).unwrap();
    fs::write(dir.path().join("GAMES").join("PONG.BA"), vec![0u8; 70_000]).unwrap();
    let mut storage = HostStorage::new(dir.path());
    storage.mount().unwrap();
    (dir, storage)
}

#[test]
fn test_listing_is_sorted_and_flags_hidden() {
    let (_dir, storage) = fixture();
    let entries: Vec<_> = storage.open_directory("/").unwrap().collect();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, [".hidden", "GAMES", "HELLO.DO"]);
    assert!(entries[0].is_hidden);
    assert!(entries[1].is_folder);
    assert_eq!(entries[2].size, 11);
}

#[test]
fn test_case_insensitive_lookup() {
    let (_dir, storage) = fixture();
    let entry = storage.metadata("/games/pong.ba").unwrap();
    assert!(!entry.is_folder);
    assert_eq!(entry.size, 70_000);
}

#[test]
fn test_open_modes() {
    let (dir, mut storage) = fixture();

    assert!(matches!(
        storage.open("/MISSING.DO", OpenMode::Read).unwrap(),
        Opened::NotFound
    ));
    assert!(matches!(
        storage.open("/GAMES", OpenMode::Read).unwrap(),
        Opened::Directory
    ));

    match storage.open("/HELLO.DO", OpenMode::Append).unwrap() {
        Opened::File(mut file) => {
            assert_eq!(file.write(b"!").unwrap(), 1);
        }
        _ => panic!("expected a file"),
    }
    assert_eq!(fs::read(dir.path().join("HELLO.DO")).unwrap(), b"HELLO WORLD!");

    match storage.open("/HELLO.DO", OpenMode::Write).unwrap() {
        Opened::File(mut file) => {
            file.write(b"BYE").unwrap();
            assert_eq!(file.position(), 3);
        }
        _ => panic!("expected a file"),
    }
    assert_eq!(fs::read(dir.path().join("HELLO.DO")).unwrap(), b"BYE");
}

#[test]
fn test_remove_only_empty_directories() {
    let (dir, mut storage) = fixture();
    assert!(matches!(
        storage.remove("/GAMES"),
        Err(TpddError::NotEmpty(_))
    ));

    storage.remove("/GAMES/PONG.BA").unwrap();
    storage.remove("/GAMES").unwrap();
    assert!(!dir.path().join("GAMES").exists());
}

#[test]
fn test_rename_and_mkdir() {
    let (dir, mut storage) = fixture();
    storage.make_directory("/NEW").unwrap();
    assert!(matches!(
        storage.make_directory("/NEW"),
        Err(TpddError::AlreadyExists(_))
    ));

    storage.rename("/HELLO.DO", "/NEW/HI.DO").unwrap();
    assert!(dir.path().join("NEW").join("HI.DO").exists());
    assert!(matches!(
        storage.rename("/HELLO.DO", "/X.DO"),
        Err(TpddError::NotFound(_))
    ));
}

#[test]
fn test_escape_is_rejected() {
    let (_dir, mut storage) = fixture();
    assert!(matches!(
        storage.open("/../outside", OpenMode::Write),
        Err(TpddError::InvalidName(_))
    ));
}

fn enter(emu: &mut Emulator<HeadlessTransport, HostStorage>, bytes: Vec<u8>) -> Vec<u8> {
    emu.link_mut().queue_input(&bytes);
    emu.poll(Instant::now()).unwrap();
    emu.link_mut().take_output()
}

#[test]
fn test_extended_reference_over_host_storage() {
    let (_dir, storage) = fixture();
    let mut emu = Emulator::new(HeadlessTransport::new(), storage);
    emu.mount().unwrap();

    // DME on, then enter GAMES.
    enter(&mut emu, encode_frame(0x08, &[]));
    let mut pick = encode_wire_name("GAMES", true, true).to_vec();
    pick.extend_from_slice(&[b'F', 0]);
    enter(&mut emu, encode_frame(0x00, &pick));
    let out = enter(&mut emu, encode_frame(0x01, &[3]));
    assert_eq!(&out[..3], &[0x12, 0x01, 0x00]);

    let mut pick = encode_wire_name("PONG.BA", false, true).to_vec();
    pick.extend_from_slice(&[b'F', 0]);
    let out = enter(&mut emu, encode_frame(0x00, &pick));

    // 70000 = 0x0001_1170: bits 15..0, then 'P', then bits 31..16.
    assert_eq!(&out[..2], &[0x11, 0x1E]);
    assert_eq!(&out[2 + 25..2 + 30], &[0x11, 0x70, b'P', 0x00, 0x01]);
}

#[test]
fn test_append_handle_starts_at_end() {
    let (_dir, mut storage) = fixture();
    match storage.open("/HELLO.DO", OpenMode::Append).unwrap() {
        Opened::File(file) => assert_eq!(file.position(), 11),
        _ => panic!("expected a file"),
    }
    match storage.open("/HELLO.DO", OpenMode::ReadWrite).unwrap() {
        Opened::File(mut file) => {
            let mut buf = [0u8; 5];
            assert_eq!(file.read(&mut buf).unwrap(), 5);
            assert_eq!(file.position(), 5);
        }
        _ => panic!("expected a file"),
    }
}

#[test]
fn test_tell_after_append_over_host_storage() {
    let (dir, storage) = fixture();
    fs::write(dir.path().join("TEN.DO"), b"0123456789").unwrap();
    let mut emu = Emulator::new(HeadlessTransport::new(), storage);
    emu.mount().unwrap();

    let mut pick = encode_wire_name("TEN.DO", false, false).to_vec();
    pick.extend_from_slice(&[b'F', 0]);
    enter(&mut emu, encode_frame(0x00, &pick));
    let out = enter(&mut emu, encode_frame(0x01, &[2]));
    assert_eq!(&out[..3], &[0x12, 0x01, 0x00]);

    let out = enter(&mut emu, encode_frame(0x0A, &[]));
    assert_eq!(&out[..6], &[0x10, 0x04, 10, 0, 0, 0]);
}
