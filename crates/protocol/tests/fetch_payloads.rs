#![forbid(unsafe_code)]

use kwire_protocol::{
    read_frames, read_record_batches, read_v0_messages, read_v1_messages, MessageV0, MessageV1,
    ReadFrom, Record, RecordBatch, FRAME_HEADER_LEN,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn range_usize(&mut self, min_inclusive: usize, max_inclusive: usize) -> usize {
        assert!(min_inclusive <= max_inclusive);
        let span = max_inclusive - min_inclusive + 1;
        min_inclusive + ((self.next_u64() >> 32) as usize % span)
    }

    fn bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| (self.next_u64() & 0xff) as u8).collect()
    }
}

fn frame(base_offset: i64, declared: i32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&base_offset.to_be_bytes());
    out.extend_from_slice(&declared.to_be_bytes());
    out.extend_from_slice(body);
    out
}

#[derive(Debug, PartialEq, Eq)]
struct Opaque(Vec<u8>);

impl ReadFrom for Opaque {
    fn read_from(input: &[u8]) -> kwire_protocol::Result<Self> {
        Ok(Self(input[FRAME_HEADER_LEN..].to_vec()))
    }
}

#[test]
fn one_complete_frame_then_partial_frame() {
    init_tracing();
    let mut input = frame(0, 5, &[1, 2, 3, 4, 5]);
    input.extend(frame(1, 100, &[9, 9, 9]));
    assert_eq!(input.len(), 17 + 15);

    let decoded = read_frames::<Opaque>(&input);
    assert_eq!(decoded, vec![Opaque(vec![1, 2, 3, 4, 5])]);
}

#[test]
fn twelve_bytes_is_not_enough_for_any_frame() {
    assert!(read_frames::<Opaque>(&frame(0, 0, &[])).is_empty());
    assert_eq!(read_frames::<Opaque>(&frame(0, 1, &[7])).len(), 1);
    assert!(read_frames::<Opaque>(&[]).is_empty());
    assert!(read_frames::<Opaque>(&[0; 11]).is_empty());
}

#[test]
fn zero_length_frame_followed_by_more_data() {
    // an empty body frame is only reachable when more bytes follow it
    let mut input = frame(0, 0, &[]);
    input.extend(frame(1, 2, &[4, 2]));
    let decoded = read_frames::<Opaque>(&input);
    assert_eq!(decoded, vec![Opaque(Vec::new()), Opaque(vec![4, 2])]);
}

#[test]
fn randomized_record_batches_truncated_at_every_length() {
    let mut rng = Lcg::new(0x6b77_6972_65);
    for _ in 0..16 {
        let batch_count = rng.range_usize(1, 4);
        let mut encoded = Vec::new();
        let mut boundaries = Vec::new();
        let mut batches = Vec::new();
        for index in 0..batch_count {
            let record_count = rng.range_usize(0, 5);
            let records: Vec<Record> = (0..record_count)
                .map(|delta| {
                    let key_len = rng.range_usize(0, 6);
                    let value_len = rng.range_usize(0, 40);
                    Record::new(delta as i32, Some(rng.bytes(key_len)), Some(rng.bytes(value_len)))
                })
                .collect();
            let batch = RecordBatch::from_records(index as i64 * 100, &records);
            batch.append_to(&mut encoded);
            boundaries.push(encoded.len());
            batches.push(batch);
        }

        for cut in 0..=encoded.len() {
            let decoded = read_record_batches(&encoded[..cut]);
            let expected = boundaries.iter().filter(|end| **end <= cut).count();
            assert_eq!(decoded.len(), expected, "cut at {cut}");
            assert_eq!(decoded[..], batches[..expected]);
        }
    }
}

#[test]
fn record_batches_decode_identically_twice() {
    let records = vec![
        Record::new(0, None, Some(b"first".to_vec())),
        Record::new(1, None, Some(b"second".to_vec())).with_header("h", None),
    ];
    let mut encoded = Vec::new();
    RecordBatch::from_records(7, &records).append_to(&mut encoded);
    RecordBatch::from_records(9, &records[..1]).append_to(&mut encoded);

    let first = read_record_batches(&encoded);
    let second = read_record_batches(&encoded);
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(first[1].records().expect("records")[0].value, records[0].value);
}

#[test]
fn corrupt_middle_batch_hides_the_rest() {
    init_tracing();
    let record = Record::new(0, None, Some(b"x".to_vec()));
    let mut encoded = Vec::new();
    RecordBatch::from_records(0, &[record.clone()]).append_to(&mut encoded);
    let second_start = encoded.len();
    RecordBatch::from_records(1, &[record.clone()]).append_to(&mut encoded);
    RecordBatch::from_records(2, &[record]).append_to(&mut encoded);
    encoded[second_start + 16] = 9;

    let decoded = read_record_batches(&encoded);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].base_offset, 0);
}

#[test]
fn legacy_message_sets_share_the_framing() {
    let mut v0 = Vec::new();
    let mut v1 = Vec::new();
    for offset in 0..3 {
        MessageV0::new(offset, None, Some(vec![offset as u8; 4])).append_to(&mut v0);
        MessageV1::new(offset, 1000 + offset, Some(b"k".to_vec()), None).append_to(&mut v1);
    }
    let v0_len = v0.len();
    let v1_len = v1.len();
    v0.extend(frame(3, 1_000, &[0; 20]));
    v1.extend(frame(3, 1_000, &[0; 20]));

    let decoded_v0 = read_v0_messages(&v0);
    let decoded_v1 = read_v1_messages(&v1);
    assert_eq!(decoded_v0.len(), 3);
    assert_eq!(decoded_v1.len(), 3);
    assert_eq!(decoded_v0[2].value.as_deref(), Some(&[2_u8; 4][..]));
    assert_eq!(decoded_v1[1].timestamp, 1001);

    assert_eq!(read_v0_messages(&v0[..v0_len]), decoded_v0);
    assert_eq!(read_v1_messages(&v1[..v1_len]), decoded_v1);
}
