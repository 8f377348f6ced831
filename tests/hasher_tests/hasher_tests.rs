//! Tests for KeyHasher
//!
//! These tests verify:
//! - Determinism across hasher instances
//! - Hash width masking
//! - Constant-length prefix extraction

use std::collections::HashSet;

use porkdb::config::HasherKind;
use porkdb::KeyHasher;

// =============================================================================
// Content Hasher Tests
// =============================================================================

#[test]
fn test_content_hash_is_deterministic() {
    let a = KeyHasher::new(HasherKind::Content, 20);
    let b = KeyHasher::new(HasherKind::Content, 20);

    for i in 0..100 {
        let key = format!("key{}", i);
        assert_eq!(a.hash(key.as_bytes()), b.hash(key.as_bytes()));
    }
}

#[test]
fn test_content_hash_fits_width() {
    for bits in [1, 7, 8, 16, 31, 32, 63] {
        let hasher = KeyHasher::new(HasherKind::Content, bits);
        for i in 0..200u32 {
            let hash = hasher.hash(&i.to_le_bytes());
            assert!(hash <= hasher.mask(), "bits={} hash={:#x}", bits, hash);
        }
    }
}

#[test]
fn test_content_hash_full_width() {
    let hasher = KeyHasher::new(HasherKind::Content, 64);
    assert_eq!(hasher.mask(), u64::MAX);

    // 64-bit hashes of distinct small keys should not collide
    let hashes: HashSet<u64> = (0..1000u32).map(|i| hasher.hash(&i.to_le_bytes())).collect();
    assert_eq!(hashes.len(), 1000);
}

#[test]
fn test_content_hash_spreads_keys() {
    let hasher = KeyHasher::new(HasherKind::Content, 16);
    let hashes: HashSet<u64> = (0..256u32).map(|i| hasher.hash(&i.to_le_bytes())).collect();

    // A handful of birthday collisions at most
    assert!(hashes.len() > 240);
}

// =============================================================================
// Constant-Length Hasher Tests
// =============================================================================

#[test]
fn test_constant_length_takes_leading_bits() {
    let key = [0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45, 0x67, 0x89, 0xFF];

    assert_eq!(KeyHasher::new(HasherKind::ConstantLength, 8).hash(&key), 0xAB);
    assert_eq!(KeyHasher::new(HasherKind::ConstantLength, 12).hash(&key), 0xABC);
    assert_eq!(KeyHasher::new(HasherKind::ConstantLength, 16).hash(&key), 0xABCD);
    assert_eq!(KeyHasher::new(HasherKind::ConstantLength, 1).hash(&key), 1);
    assert_eq!(
        KeyHasher::new(HasherKind::ConstantLength, 64).hash(&key),
        0xABCD_EF01_2345_6789
    );
}

#[test]
fn test_constant_length_pads_short_keys() {
    let hasher = KeyHasher::new(HasherKind::ConstantLength, 32);

    assert_eq!(hasher.hash(&[0x12]), 0x1200_0000);
    assert_eq!(hasher.hash(&[]), 0);
}

#[test]
fn test_constant_length_ignores_trailing_bytes() {
    let hasher = KeyHasher::new(HasherKind::ConstantLength, 8);

    assert_eq!(hasher.hash(&[0x42, 0x00]), hasher.hash(&[0x42, 0xFF, 0xFF]));
}

#[test]
fn test_bits_accessor() {
    let hasher = KeyHasher::new(HasherKind::Content, 24);
    assert_eq!(hasher.bits(), 24);
    assert_eq!(hasher.mask(), 0xFF_FFFF);
}
