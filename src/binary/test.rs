use super::*;
use crate::backend::Mock;

/// Encode a record the way the instrument does.
fn record(forward: (i32, i32), reflected: (i32, i32), through: (i32, i32), index: u16) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(FifoRecord::LEN);
    for value in [forward.0, forward.1, reflected.0, reflected.1, through.0, through.1] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes.extend_from_slice(&index.to_le_bytes());
    bytes.extend_from_slice(&[0; 6]);
    bytes
}

#[test]
fn decode_record() {
    // Integer waves, so the ratios carry the fractions.
    let bytes = record((4, 0), (2, 0), (1, 0), 7);
    let decoded = FifoRecord::decode(&bytes).unwrap();
    assert_eq!(decoded.freq_index, 7);
    assert_eq!(decoded.reflection(), Complex64::new(0.5, 0.0));
    assert_eq!(decoded.transmission(), Complex64::new(0.25, 0.0));

    assert!(FifoRecord::decode(&bytes[..31]).is_none());
}

#[test]
fn records_are_placed_by_frequency_index() {
    let mut bytes = record((4, 0), (2, 0), (1, 0), 7);
    bytes.extend(record((1, 0), (0, 1), (1, 0), 2));
    let mut sweep = vec![(Complex64::default(), Complex64::default()); 8];
    place_records(&bytes, &mut sweep);
    assert_eq!(sweep[7], (Complex64::new(0.5, 0.0), Complex64::new(0.25, 0.0)));
    assert_eq!(sweep[2], (Complex64::new(0.0, 1.0), Complex64::new(1.0, 0.0)));
    assert_eq!(sweep[0], (Complex64::default(), Complex64::default()));
}

#[test]
fn out_of_range_index_is_ignored() {
    let bytes = record((1, 0), (1, 0), (1, 0), 300);
    let mut sweep = vec![(Complex64::default(), Complex64::default()); 3];
    place_records(&bytes, &mut sweep);
    assert!(sweep.iter().all(|s| *s == (Complex64::default(), Complex64::default())));
}

#[test]
fn sweep_program_frame() {
    let frame = SweepProgram::new(200_000_000, 1_000_000, 101, false).encode();
    let mut expected = vec![command::WRITE8, register::SWEEP_START];
    expected.extend_from_slice(&200_000_000u64.to_le_bytes());
    expected.extend_from_slice(&[command::WRITE8, register::SWEEP_STEP]);
    expected.extend_from_slice(&1_000_000u64.to_le_bytes());
    expected.extend_from_slice(&[command::WRITE2, register::SWEEP_POINTS, 101, 0]);
    expected.extend_from_slice(&[command::WRITE2, register::SWEEP_VALS_PER_FREQ, 1, 0]);
    assert_eq!(frame, expected);
}

#[test]
fn sweep_program_hack_and_floor() {
    let frame = SweepProgram::new(1_000_000, 1_000_000, 1023, true).encode();
    // Shifted one step down, then clamped to the floor.
    assert_eq!(&frame[2..10], &MIN_START_FREQUENCY.to_le_bytes());
    assert_eq!(&frame[22..24], &1024u16.to_le_bytes());

    let frame = SweepProgram::new(3_000_000, 1_000_000, 101, true).encode();
    assert_eq!(&frame[2..10], &2_000_000u64.to_le_bytes());
}

#[test]
fn batch_timeouts() {
    assert_eq!(batch_timeout(101), Duration::from_millis(3635));
    assert_eq!(batch_timeout(1024), Duration::from_millis(9025));
}

#[test]
fn read_sweep_from_fifo() {
    let mut mock = Mock::new();
    let mut fifo = record((2, 0), (1, 0), (2, 0), 1);
    fifo.extend(record((2, 0), (0, 2), (0, 0), 0));
    fifo.extend(record((2, 0), (2, 0), (1, 1), 2));
    mock.reply([command::READFIFO, register::VALUES_FIFO, 3], &fifo);
    let transport = Transport::open_mock(mock);

    let sweep = read_sweep(&transport, 3, false, Duration::ZERO).unwrap();
    assert_eq!(sweep.len(), 3);
    assert_eq!(sweep[0].0, Complex64::new(0.0, 1.0));
    assert_eq!(sweep[1], (Complex64::new(0.5, 0.0), Complex64::new(1.0, 0.0)));
    assert_eq!(sweep[2].1, Complex64::new(0.5, 0.5));

    let backend = transport.into_backend().unwrap();
    assert_eq!(
        backend.written(),
        [
            RESET.to_vec(),
            vec![command::WRITE, register::VALUES_FIFO, 0],
            vec![command::READFIFO, register::VALUES_FIFO, 3],
        ]
    );
}

#[test]
fn read_sweep_drops_hack_point() {
    let mut mock = Mock::new();
    let mut fifo = record((1, 0), (9, 9), (9, 9), 0);
    fifo.extend(record((1, 0), (1, 0), (0, 1), 1));
    mock.reply([command::READFIFO, register::VALUES_FIFO, 2], &fifo);
    let transport = Transport::open_mock(mock);

    let sweep = read_sweep(&transport, 1, true, Duration::ZERO).unwrap();
    assert_eq!(sweep, [(Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0))]);
}

#[test]
fn read_sweep_in_batches() {
    let mut mock = Mock::new();
    let first: Vec<u8> = (0..255u16).flat_map(|i| record((1, 0), (1, 0), (1, 0), i)).collect();
    let second: Vec<u8> = (255..300u16).flat_map(|i| record((1, 0), (0, 1), (0, 1), i)).collect();
    mock.reply([command::READFIFO, register::VALUES_FIFO, 255], &first);
    mock.reply([command::READFIFO, register::VALUES_FIFO, 45], &second);
    let transport = Transport::open_mock(mock);

    let sweep = read_sweep(&transport, 300, false, Duration::ZERO).unwrap();
    assert_eq!(sweep.len(), 300);
    assert_eq!(sweep[254].0, Complex64::new(1.0, 0.0));
    assert_eq!(sweep[255].0, Complex64::new(0.0, 1.0));
}

#[test]
fn short_fifo_read_fails_after_one_retry() {
    let mut mock = Mock::new();
    let fifo = record((1, 0), (1, 0), (1, 0), 0);
    mock.reply([command::READFIFO, register::VALUES_FIFO, 2], &fifo);
    let transport = Transport::open_mock(mock);

    let err = read_sweep(&transport, 2, false, Duration::ZERO).unwrap_err();
    let err = FifoShortReadError::try_from(err).unwrap();
    assert_eq!(err.expected(), 64);
    assert_eq!(err.received(), 32);
    // The transport is usable again and the timeout was restored.
    assert!(transport.lock().is_ok());
}

#[test]
fn read_register_pair_requires_two_bytes() {
    let mut mock = Mock::new();
    mock.reply(
        [command::READ, register::FW_MAJOR, command::READ, register::FW_MINOR],
        [1u8, 3],
    );
    mock.reply(
        [command::READ, register::DEVICE_VARIANT, command::READ, register::HARDWARE_REVISION],
        [2u8],
    );
    let transport = Transport::open_mock(mock);

    let pair = read_register_pair(&transport, register::FW_MAJOR, register::FW_MINOR, Duration::ZERO)
        .unwrap();
    assert_eq!(pair, [1, 3]);

    let err = read_register_pair(
        &transport,
        register::DEVICE_VARIANT,
        register::HARDWARE_REVISION,
        Duration::ZERO,
    )
    .unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn tx_power() {
    let transport = Transport::open_mock(Mock::new());
    set_tx_power(&transport, TxPower::Attenuation6dB).unwrap();
    let backend = transport.into_backend().unwrap();
    assert_eq!(backend.written(), [vec![command::WRITE, 0x42, 1]]);

    assert_eq!(TxPower::from_description("Maximum"), Some(TxPower::Maximum));
    assert_eq!(TxPower::from_description("12dB attenuation"), None);
}
