//! Identity record persistence tests

use iobeam_embedded::identity::{self, DeviceId, RECORD_MAGIC};
use iobeam_embedded::{OpenMode, Storage, StorageError};
use iobeam_test_utils::MemoryStorage;

const NAME: &str = "iobeam-device-id";
const ID: &str = "0123456789abcdefghij";

fn record(magic: &[u8], len: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = magic.to_vec();
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

#[test]
fn test_round_trip() {
    let mut storage = MemoryStorage::new();
    let id = DeviceId::new(ID).unwrap();
    assert_eq!(id.len(), 20);

    identity::save(&mut storage, NAME, &id).unwrap();
    assert_eq!(identity::load(&mut storage, NAME), Some(id));
    assert_eq!(storage.open_files(), 0);
}

#[test]
fn test_save_creates_then_overwrites() {
    let mut storage = MemoryStorage::new();
    assert!(!storage.contains(NAME));

    identity::save(&mut storage, NAME, &DeviceId::new(ID).unwrap()).unwrap();
    assert_eq!(storage.get(NAME).unwrap().len(), 32);

    let other = DeviceId::new("ffffffffffffffffffff").unwrap();
    identity::save(&mut storage, NAME, &other).unwrap();
    assert_eq!(identity::load(&mut storage, NAME), Some(other));
}

#[test]
fn test_shorter_id_rewrites_whole_record() {
    let mut storage = MemoryStorage::new();
    identity::save(&mut storage, NAME, &DeviceId::new(&"a".repeat(40)).unwrap()).unwrap();
    assert_eq!(storage.get(NAME).unwrap().len(), 52);

    let short = DeviceId::new("bbbbbbbbbbbbbbbb").unwrap();
    identity::save(&mut storage, NAME, &short).unwrap();
    assert_eq!(storage.get(NAME).unwrap(), record(&RECORD_MAGIC, 16, short.as_bytes()));
    assert_eq!(identity::load(&mut storage, NAME), Some(short));
}

#[test]
fn test_missing_record_is_absent() {
    let mut storage = MemoryStorage::new();
    assert_eq!(identity::load(&mut storage, NAME), None);
}

#[test]
fn test_corrupted_tag_is_absent() {
    let mut storage = MemoryStorage::new();
    identity::save(&mut storage, NAME, &DeviceId::new(ID).unwrap()).unwrap();

    for i in 0..RECORD_MAGIC.len() {
        let mut bytes = storage.get(NAME).unwrap();
        bytes[i] ^= 0x20;
        let mut corrupted = MemoryStorage::new();
        corrupted.put(NAME, bytes);
        assert_eq!(identity::load(&mut corrupted, NAME), None, "byte {}", i);
        assert_eq!(corrupted.open_files(), 0);
    }
}

#[test]
fn test_length_out_of_range_is_absent() {
    let mut storage = MemoryStorage::new();
    for len in [0u32, 15, 49, u32::MAX] {
        storage.put(NAME, record(&RECORD_MAGIC, len, &[b'a'; 64]));
        assert_eq!(identity::load(&mut storage, NAME), None, "length {}", len);
    }

    for len in [16u32, 48] {
        storage.put(NAME, record(&RECORD_MAGIC, len, &[b'a'; 64]));
        let id = identity::load(&mut storage, NAME).unwrap();
        assert_eq!(id.len(), len as usize);
    }
}

#[test]
fn test_short_payload_is_absent() {
    let mut storage = MemoryStorage::new();
    storage.put(NAME, record(&RECORD_MAGIC, 20, b"only-ten-b"));
    assert_eq!(identity::load(&mut storage, NAME), None);

    storage.put(NAME, b"iobeam".to_vec());
    assert_eq!(identity::load(&mut storage, NAME), None);
}

#[test]
fn test_save_failure_is_reported() {
    let mut storage = MemoryStorage::new();
    storage.fail_writes(true);
    assert_eq!(
        identity::save(&mut storage, NAME, &DeviceId::new(ID).unwrap()),
        Err(StorageError::Io)
    );
    assert_eq!(storage.open_files(), 0);
}

#[test]
fn test_erase() {
    let mut storage = MemoryStorage::new();
    identity::save(&mut storage, NAME, &DeviceId::new(ID).unwrap()).unwrap();

    identity::erase(&mut storage, NAME).unwrap();
    assert!(storage.open(NAME, OpenMode::Read).is_err());
    identity::erase(&mut storage, NAME).unwrap();
}
