//! End-to-end flows over an in-memory target

use external_memory::memory::mock::{MockProcess, RecordingSink};
use external_memory::{
    Address, Diagnostics, ExternalProcess, FailureKind, ProcessArchitecture, Protection, ReadMode,
    ReadOutput,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// game.exe image with a signature whose trailing 4 bytes hold the address of
/// a global player pointer, and a heap holding the player struct.
fn game() -> MockProcess {
    let mut image = vec![0x90u8; 0x200];
    // mov rax, [0x00600000]
    image[0x120..0x128].copy_from_slice(&[0x48, 0x8B, 0x05, 0x00, 0x00, 0x60, 0x00, 0xC3]);

    let mut globals = vec![0u8; 0x100];
    globals[..8].copy_from_slice(&0x0070_0000u64.to_le_bytes());

    let mut player = vec![0u8; 0x100];
    player[0x10..0x14].copy_from_slice(&100i32.to_le_bytes());
    player[0x40..0x4A].copy_from_slice(b"Lara\0junk\0");

    MockProcess::builder()
        .module("game.exe", 0x40_0000, image)
        .module("engine.dll", 0x50_0000, vec![0u8; 0x80])
        .region(0x60_0000, globals, Protection::read_write())
        .region(0x70_0000, player, Protection::read_write())
        .build()
}

#[test]
fn test_signature_to_value_workflow() {
    let process = ExternalProcess::new(game());

    let base = process.get_module("game.exe");
    assert_eq!(base, Address::new(0x40_0000));

    let hit = process.find_signature(base, "48 8B 05 ? ? ? ? C3", 0x200);
    assert_eq!(hit, Address::new(0x40_0120));

    let global = process.read::<u32>(hit.add(3), true) as usize;
    assert_eq!(global, 0x60_0000);

    let health = process.get_address(global, &[0x0, 0x10]);
    assert_eq!(health, Address::new(0x70_0010));
    assert_eq!(process.read::<i32>(health, true), 100);

    let name = process.get_address(global, &[0x0, 0x40]);
    assert_eq!(process.read_text(name, true), "Lara");
}

#[test]
fn test_write_then_read_back() {
    let process = ExternalProcess::new(game());
    let health = process.get_address(0x60_0000usize, &[0x0, 0x10]);

    assert_eq!(process.write(health, 75i32, true), Some(75));
    assert_eq!(process.read::<i32>(health, true), 75);

    assert!(process.write_bytes(health, &[1, 0, 0, 0], false));
    assert_eq!(process.read::<i32>(health, false), 1);
}

#[test]
fn test_module_lookup_is_exact() {
    let process = ExternalProcess::new(game());
    assert!(process.get_module("engine.dll").is_valid());
    assert!(!process.get_module("ENGINE.DLL").is_valid());
    assert!(!process.get_module("engine").is_valid());
    assert!(!process.get_module("").is_valid());
}

#[test]
fn test_guard_and_diagnostics_together() {
    let sink = Arc::new(RecordingSink::default());
    let process =
        ExternalProcess::new(game()).with_diagnostics(Diagnostics::new(true, sink.clone()));

    // Code pages reject checked writes and leave the image intact
    assert_eq!(process.write(0x40_0120usize, 0u8, true), None);
    assert_eq!(process.process().bytes_at(0x40_0120, 1), Some(vec![0x48]));

    // Unmapped memory reads as zero
    assert_eq!(process.read::<u64>(0xDEAD_0000usize, true), 0);

    // 0x600008 holds a null pointer
    assert!(!process.get_address(0x60_0000usize, &[0x8, 0x0, 0x0]).is_valid());

    let events = sink.events();
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            FailureKind::GuardRejection,
            FailureKind::GuardRejection,
            FailureKind::Resolution
        ]
    );
    assert_eq!(events[2].operation, "get_address");
}

#[test]
fn test_thirty_two_bit_target_uses_four_byte_pointers() {
    let mut table = vec![0xFFu8; 0x10];
    table[..4].copy_from_slice(&0x2000u32.to_le_bytes());
    let process = ExternalProcess::new(
        MockProcess::builder()
            .architecture(ProcessArchitecture::X86)
            .region(0x1000, table, Protection::read_only())
            .region(0x2000, vec![7u8; 0x10], Protection::read_only())
            .build(),
    );

    let resolved = process.get_address(0x1000usize, &[0x0, 0x4]);
    assert_eq!(resolved, Address::new(0x2004));
    assert_eq!(process.read::<u8>(resolved, true), 7);
}

#[test]
fn test_read_modes() {
    let process = ExternalProcess::new(game());
    let name = process.get_address(0x60_0000usize, &[0x0, 0x40]);

    assert_eq!(
        process.read_mode(name, ReadMode::Text { max_len: 200 }, true),
        ReadOutput::Text("Lara".to_string())
    );
    assert_eq!(
        process.read_mode(name, ReadMode::Bytes(4), true),
        ReadOutput::Bytes(b"Lara".to_vec())
    );
}
