//! Integration tests for BlobReadChannel against a directory-backed LocalClient.
//!
//! These tests verify that reads are independent of chunking, that captured states resume to the
//! same bytes (including through a serialized token), and that replaced blobs are detected.

use std::io::Read;
use std::sync::Arc;

use blob_client::client_testing_utils::{FaultInjectingBackend, random_data};
use blob_client::{
    BlobClientError, BlobId, BlobReadChannel, BlobSourceOption, CapturedState, LocalClient, ReadOptions, ReadOutcome,
    StorageBackend, TransportError,
};
use blob_config::BlobConfig;

/// Small chunk size for testing - produces many fetches per blob.
const CHUNK_SIZE: usize = 579;

fn config() -> BlobConfig {
    BlobConfig::for_testing()
}

/// Opens a channel with the testing config and the given chunk size.
fn open(backend: Arc<dyn StorageBackend>, blob: &BlobId, options: ReadOptions, chunk_size: usize) -> BlobReadChannel {
    let mut channel = BlobReadChannel::open_with_config(backend, blob.clone(), options, &config());
    channel.set_chunk_size(chunk_size);
    channel
}

/// Reads until end of stream using a destination of `read_size` bytes.
fn read_all(channel: &mut BlobReadChannel, read_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; read_size];
    while let ReadOutcome::Data(n) = channel.read(&mut buf).unwrap() {
        out.extend_from_slice(&buf[..n]);
    }
    out
}

/// Reads at most `max_bytes`, possibly stopping in the middle of a buffered chunk.
fn read_up_to(channel: &mut BlobReadChannel, max_bytes: usize, read_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; read_size];
    while out.len() < max_bytes {
        let want = read_size.min(max_bytes - out.len());
        match channel.read(&mut buf[..want]).unwrap() {
            ReadOutcome::Data(n) => out.extend_from_slice(&buf[..n]),
            ReadOutcome::EndOfStream => break,
        }
    }
    out
}

fn upload(client: &LocalClient, name: &str, size: usize, seed: u64) -> (BlobId, Vec<u8>) {
    let data = random_data(size, seed);
    client.put_blob("bucket", name, &data).unwrap();
    (BlobId::new("bucket", name), data)
}

// ============================================================================
// Full reads
// ============================================================================

#[test]
fn test_full_read_various_chunkings() {
    let client = LocalClient::temporary().unwrap();
    let (blob, data) = upload(&client, "a/b/data.bin", 20_000, 1);

    for chunk_size in [1usize, 64, CHUNK_SIZE, 8192, 100_000] {
        for read_size in [1usize, 100, 4096, 50_000] {
            if chunk_size == 1 && read_size == 1 {
                // Exercised by the unit tests on a smaller blob.
                continue;
            }
            let mut channel = open(client.clone(), &blob, ReadOptions::new(), chunk_size);
            assert_eq!(read_all(&mut channel, read_size), data, "chunk_size={chunk_size} read_size={read_size}");
        }
    }
}

#[test]
fn test_std_io_read_to_end() {
    let client = LocalClient::temporary().unwrap();
    let (blob, data) = upload(&client, "file", 10_000, 2);

    let mut channel = open(client, &blob, ReadOptions::new(), CHUNK_SIZE);
    let mut out = Vec::new();
    channel.read_to_end(&mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_empty_blob() {
    let client = LocalClient::temporary().unwrap();
    let (blob, _) = upload(&client, "empty", 0, 3);

    let mut channel = open(client, &blob, ReadOptions::new(), CHUNK_SIZE);
    assert!(read_all(&mut channel, 100).is_empty());
}

// ============================================================================
// Ranges
// ============================================================================

#[test]
fn test_ranged_reads() {
    let client = LocalClient::temporary().unwrap();
    let (blob, data) = upload(&client, "ranged", 10_000, 4);

    for (start, end) in [(0u64, 1u64), (0, 579), (100, 5000), (9999, 10_000), (5000, 20_000), (12_000, 13_000)] {
        let mut channel = open(client.clone(), &blob, ReadOptions::new(), CHUNK_SIZE);
        channel.seek(start).unwrap();
        channel.set_limit(end);

        let s = (start as usize).min(data.len());
        let e = (end as usize).min(data.len());
        assert_eq!(read_all(&mut channel, 1000), &data[s..e], "range {start}..{end}");
    }
}

// ============================================================================
// Resumption
// ============================================================================

#[test]
fn test_resume_at_many_points() {
    let client = LocalClient::temporary().unwrap();
    let (blob, data) = upload(&client, "resume", 7777, 5);

    for stop in [0usize, 1, 100, 578, 579, 580, 3000, 7776, 7777] {
        let mut channel = open(client.clone(), &blob, ReadOptions::new(), CHUNK_SIZE);
        let head = read_up_to(&mut channel, stop, 97);
        let state = channel.capture();
        assert_eq!(state.position(), head.len() as u64);
        drop(channel);

        let mut restored = BlobReadChannel::restore_with_config(&state, client.clone(), &config());
        let tail = read_all(&mut restored, 1001);

        let mut joined = head;
        joined.extend_from_slice(&tail);
        assert_eq!(joined, data, "stop={stop}");
    }
}

#[test]
fn test_resume_through_serialized_token() {
    let client = LocalClient::temporary().unwrap();
    let (blob, data) = upload(&client, "token", 5000, 6);

    let options = ReadOptions::new().with(BlobSourceOption::UserProject("billing-project".to_owned()));
    let mut channel = open(client.clone(), &blob, options.clone(), CHUNK_SIZE);
    channel.set_limit(4000);
    let head = read_up_to(&mut channel, 1234, 200);

    let token = serde_json::to_string(&channel.capture()).unwrap();
    let state: CapturedState = serde_json::from_str(&token).unwrap();
    assert_eq!(state.options(), &options);
    assert_eq!(state.limit(), 4000);
    assert_eq!(state.chunk_size(), CHUNK_SIZE);

    // A new client instance over the same directory serves the same generation.
    let second_client = LocalClient::new(client.root()).unwrap();
    let mut restored = BlobReadChannel::restore_with_config(&state, second_client, &config());
    let tail = read_all(&mut restored, 333);

    assert_eq!([head, tail].concat(), &data[..4000]);
}

#[test]
fn test_resume_fails_after_blob_replaced() {
    let client = LocalClient::temporary().unwrap();
    let (blob, _) = upload(&client, "replaced", 3000, 7);

    let mut channel = open(client.clone(), &blob, ReadOptions::new(), CHUNK_SIZE);
    read_up_to(&mut channel, 1000, 100);
    let state = channel.capture();

    client.put_blob("bucket", "replaced", &random_data(3000, 8)).unwrap();

    let mut restored = BlobReadChannel::restore_with_config(&state, client, &config());
    let mut buf = [0u8; 100];
    let err = restored.read(&mut buf).unwrap_err();
    assert!(matches!(err, BlobClientError::ExternalModification { .. }), "{err:?}");
}

// ============================================================================
// Consistency
// ============================================================================

#[test]
fn test_modification_mid_read() {
    let client = LocalClient::temporary().unwrap();
    let (blob, data) = upload(&client, "mid", 5000, 9);

    let mut channel = open(client.clone(), &blob, ReadOptions::new(), CHUNK_SIZE);
    let head = read_up_to(&mut channel, 600, 100);
    assert_eq!(head, &data[..600]);

    client.update_metadata("bucket", "mid").unwrap();

    let mut buf = [0u8; 1000];
    // The rest of the current buffer is still served.
    let mut served = 0;
    let err = loop {
        match channel.read(&mut buf) {
            Ok(ReadOutcome::Data(n)) => served += n,
            Ok(ReadOutcome::EndOfStream) => panic!("read past a modified blob"),
            Err(e) => break e,
        }
    };
    assert_eq!(served, 2 * CHUNK_SIZE - 600);
    assert!(matches!(err, BlobClientError::ExternalModification { .. }));
}

#[test]
fn test_pinned_generation() {
    let client = LocalClient::temporary().unwrap();
    let first = client.put_blob("bucket", "pinned", b"first version").unwrap();

    let mut channel = open(client.clone(), &first, ReadOptions::new(), CHUNK_SIZE);
    assert_eq!(read_all(&mut channel, 100), b"first version");

    client.put_blob("bucket", "pinned", b"second version").unwrap();

    let mut channel = open(client, &first, ReadOptions::new(), CHUNK_SIZE);
    let mut buf = [0u8; 10];
    assert!(matches!(
        channel.read(&mut buf),
        Err(BlobClientError::TransportError(TransportError::NotFound(_)))
    ));
}

#[test]
fn test_precondition_failure_is_not_retried() {
    let client = LocalClient::temporary().unwrap();
    let (blob, _) = upload(&client, "precondition", 100, 10);
    let backend = FaultInjectingBackend::new(client);

    let options = ReadOptions::new().with(BlobSourceOption::IfGenerationMatch(42));
    let mut channel = open(backend.clone(), &blob, options, CHUNK_SIZE);
    let mut buf = [0u8; 10];
    assert!(matches!(
        channel.read(&mut buf),
        Err(BlobClientError::TransportError(TransportError::PreconditionFailed(_)))
    ));
    assert_eq!(backend.attempts(), 1);
}

// ============================================================================
// Retries
// ============================================================================

#[test]
fn test_transient_failures_are_invisible() {
    let client = LocalClient::temporary().unwrap();
    let (blob, data) = upload(&client, "flaky", 3000, 11);
    let backend = FaultInjectingBackend::new(client);

    let mut channel = open(backend.clone(), &blob, ReadOptions::new(), CHUNK_SIZE);
    let mut out = Vec::new();
    let mut buf = [0u8; 400];
    loop {
        // Every logical fetch fails a few times first.
        backend.fail_next_transient(3);
        match channel.read(&mut buf).unwrap() {
            ReadOutcome::Data(n) => out.extend_from_slice(&buf[..n]),
            ReadOutcome::EndOfStream => break,
        }
    }
    assert_eq!(out, data);
}

#[test]
fn test_retries_exhausted_then_resume() {
    let client = LocalClient::temporary().unwrap();
    let (blob, data) = upload(&client, "outage", 3000, 12);
    let backend = FaultInjectingBackend::new(client.clone());

    let mut channel = open(backend.clone(), &blob, ReadOptions::new(), CHUNK_SIZE);
    let mut head = read_up_to(&mut channel, 1500, 300);

    // Whatever is still buffered is served before the outage surfaces.
    backend.fail_next_transient(usize::MAX);
    let n_attempts = backend.attempts();
    let mut buf = [0u8; 300];
    let err = loop {
        match channel.read(&mut buf) {
            Ok(ReadOutcome::Data(n)) => head.extend_from_slice(&buf[..n]),
            Ok(ReadOutcome::EndOfStream) => panic!("unexpected end of stream"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, BlobClientError::TransportExhausted { attempts: 6, .. }), "{err:?}");
    // One exhausted fetch, reported once.
    assert_eq!(backend.attempts(), n_attempts + 6);

    // The captured state is still valid and resumes against a healthy backend.
    let state = channel.capture();
    assert_eq!(state.position(), head.len() as u64);
    let mut restored = BlobReadChannel::restore_with_config(&state, client, &config());
    assert_eq!([head, read_all(&mut restored, 500)].concat(), data);
}
