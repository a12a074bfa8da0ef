//! End-to-end scenarios through the public `Shim` surface.

use shim_core::{
    probe, ChannelStatus, DisplayCandidate, FailureKind, HeadlessPlatform, HostProfile,
    MemoryStorage, OpenMode, Shim, SoundLevel,
};

fn profile() -> HostProfile {
    HostProfile {
        seed: Some(7),
        ..HostProfile::default()
    }
}

#[test]
fn test_probe_skips_failing_candidates() {
    let candidates = [
        DisplayCandidate::new(4, 320, 200, 40),
        DisplayCandidate::new(6, 640, 200, 80),
        DisplayCandidate::new(9, 640, 350, 80),
    ];
    let mut host = HeadlessPlatform::new()
        .with_modes(&[9])
        .with_faulting_modes(&[6]);

    let config = probe(&mut host, &candidates);

    assert_eq!(config.mode_id, 9);
    assert_eq!((config.pixel_width, config.pixel_height), (640, 350));
    assert_eq!(config.text_width, 80);
    assert_eq!(config.text_height, 24);
    assert_eq!(config.sound, SoundLevel::Basic);
    assert_eq!(host.attempts(), &[4, 6, 9]);
    assert_eq!(host.mode(), 9);
}

#[test]
fn test_write_then_read_back_by_parity() {
    let mut shim = Shim::start(HeadlessPlatform::new(), MemoryStorage::new(), &profile());

    // Odd logical: output on the current root, whatever mode is asked for
    assert_eq!(shim.file_open(3, OpenMode::Read, "greet"), ChannelStatus::Ok);
    assert_eq!(shim.file_write_line(3, "HELLO"), ChannelStatus::Ok);
    assert_eq!(shim.file_close(3), ChannelStatus::Ok);

    // Even logical in the same zone: input
    assert_eq!(shim.file_open(2, OpenMode::Write, "greet"), ChannelStatus::Ok);
    assert_eq!(shim.file_read_line(2), ("HELLO".to_string(), ChannelStatus::Ok));
    assert!(shim.file_eof(2));
    assert_eq!(shim.file_read_line(2), (String::new(), ChannelStatus::EndOfData));
    assert_eq!(shim.file_read_line(2), (String::new(), ChannelStatus::EndOfData));
    assert_eq!(shim.file_close(2), ChannelStatus::Ok);
}

#[test]
fn test_extended_up_arrow() {
    let host = HeadlessPlatform::new().with_input(&[0, 72]);
    let mut shim = Shim::start(host, MemoryStorage::new(), &profile());
    assert_eq!(shim.poll_key().code, 31);
    assert!(shim.poll_key().is_none());
}

#[test]
fn test_table_exhaustion_is_distinguishable() {
    let mut shim = Shim::start(HeadlessPlatform::new(), MemoryStorage::new(), &profile());
    for logical in [1, 3, 5, 7] {
        assert_eq!(shim.file_open(logical, OpenMode::Write, "f"), ChannelStatus::Ok);
    }
    // Input channels need something to read
    shim.storage_mut().add_file_str("CAS1:T", "x");
    shim.storage_mut().add_file_str("T", "x");
    shim.storage_mut().add_file_str("A:T", "x");
    shim.storage_mut().add_file_str("B:T", "x");
    for logical in [2, 4, 6, 8] {
        assert_eq!(shim.file_open(logical, OpenMode::Read, "t"), ChannelStatus::Ok);
    }

    // Sentinel open with every slot taken
    assert_eq!(shim.file_open(0, OpenMode::Read, "t"), ChannelStatus::Failed);
    assert_eq!(shim.file_last_error(), Some(FailureKind::NoFreeHandle));

    assert_eq!(shim.file_close(5), ChannelStatus::Ok);
    assert_eq!(shim.file_close(5), ChannelStatus::Failed);
    assert_eq!(shim.file_last_error(), Some(FailureKind::HandleNotFound));

    assert_eq!(shim.file_open(0, OpenMode::Read, "t"), ChannelStatus::Ok);
    assert_eq!(shim.file_last_bound(), Some(5));
}

#[test]
fn test_guest_session() {
    let host = HeadlessPlatform::new()
        .with_modes(&[2])
        .with_extended_sound(Some(true))
        .with_input(b"y");
    let mut shim = Shim::start(host, MemoryStorage::new(), &profile());
    shim.screen_init();

    shim.locate(0, 1);
    let line = format!("TOTAL {}", shim.format_fixed(2.995, 6, 2).trim_start());
    shim.print_text(&line);
    assert_eq!(shim.host().row_text(1), "TOTAL 3.00");

    shim.tone(60.0, 50.0);
    assert_eq!(shim.host().tones()[0].volume, Some(15));

    assert!(shim.graphics_init());
    shim.draw_text(0, 0, "OK");
    assert!(shim.host().pixel_count() > 0);

    assert_eq!(shim.wait_key().as_char(), Some('Y'));
    shim.finalize();
    assert_eq!(shim.host().mode(), 0);
}
