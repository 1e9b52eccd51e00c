use core_playback::ring_buffer::RingBuffer;
use core_playback::PlaybackError;

/// Copy out and consume up to `dst.len()` bytes, one contiguous run at a time.
fn drain(ring: &mut RingBuffer, dst: &mut [u8]) -> usize {
    let mut read = 0;
    while read < dst.len() {
        let chunk = ring.peek_contiguous(dst.len() - read);
        if chunk.is_empty() {
            break;
        }
        let n = chunk.len();
        dst[read..read + n].copy_from_slice(chunk);
        ring.consume(n);
        read += n;
    }
    read
}

#[test]
fn test_wrap_and_realign_scenario() {
    let mut ring = RingBuffer::new(16).unwrap();

    let first: Vec<u8> = (0..10).collect();
    assert_eq!(ring.write_from(&first), 10);

    let mut out = [0u8; 4];
    assert_eq!(drain(&mut ring, &mut out), 4);
    assert_eq!(out, [0, 1, 2, 3]);

    // Six bytes occupied, fifteen usable: only nine more fit
    let second: Vec<u8> = (10..20).collect();
    assert_eq!(ring.write_from(&second), 9);
    assert!(ring.is_full());
    assert_eq!(ring.read_index(), 4);
    assert_eq!(ring.write_index(), 3);

    assert_eq!(ring.contiguous_readable(), 12);
    ring.realign().unwrap();
    assert_eq!(ring.read_index(), 0);
    assert_eq!(ring.write_index(), 15);
    assert_eq!(ring.contiguous_readable(), 15);

    let expected: Vec<u8> = (4..19).collect();
    assert_eq!(ring.peek_contiguous(usize::MAX), &expected[..]);
}

#[test]
fn test_occupied_plus_available_is_usable_capacity() {
    let mut ring = RingBuffer::new(23).unwrap();
    let mut scratch = [0u8; 23];

    // Deterministic mix of writes, reads and realignments
    for step in 0..200usize {
        let n = (step * 7 + 3) % 13;
        match step % 4 {
            0 | 1 => {
                let data = vec![step as u8; n];
                ring.write_from(&data);
            }
            2 => {
                drain(&mut ring, &mut scratch[..n]);
            }
            _ => ring.realign().unwrap(),
        }

        assert_eq!(ring.occupied_len() + ring.available(), 22);
        assert!(ring.read_index() < ring.capacity());
        assert!(ring.write_index() < ring.capacity());
        assert!(ring.contiguous_readable() <= ring.occupied_len());
    }
}

#[test]
fn test_realign_preserves_byte_order() {
    let mut ring = RingBuffer::new(32).unwrap();
    let mut next = 0u8;
    let mut expected_next = 0u8;

    for round in 0..50 {
        let chunk: Vec<u8> = (0..11).map(|i| next.wrapping_add(i)).collect();
        let written = ring.write_from(&chunk);
        next = next.wrapping_add(written as u8);

        if round % 3 == 0 {
            ring.realign().unwrap();
            assert_eq!(ring.read_index(), 0);
        }

        let mut out = [0u8; 9];
        let read = drain(&mut ring, &mut out);
        for &byte in &out[..read] {
            assert_eq!(byte, expected_next);
            expected_next = expected_next.wrapping_add(1);
        }
    }
}

#[test]
fn test_require_contiguous_read_bounds() {
    let mut ring = RingBuffer::new(16).unwrap();
    ring.write_from(&[0; 14]);
    ring.consume(10);

    assert!(matches!(
        ring.require_contiguous_read(17),
        Err(PlaybackError::ContiguousReadTooLarge {
            requested: 17,
            capacity: 16
        })
    ));
    assert_eq!(ring.read_index(), 10);

    // 10 + 6 reaches the end of storage
    ring.require_contiguous_read(6).unwrap();
    assert_eq!(ring.read_index(), 0);
    assert_eq!(ring.occupied_len(), 4);
}
