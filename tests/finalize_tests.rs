// Integration tests for direct WAV finalization
//
// These tests upload raw PCM (and WAV fragment) chunks into a store, finalize
// them, and read the produced file back with hound.

use anyhow::Result;
use audio_sink::error::{ErrorKind, FinalizeError, PayloadError};
use audio_sink::session::{Chunk, ChunkStore};
use audio_sink::{RecordingInfo, SessionFinalizer};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

fn pcm(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn wav_fragment(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn read_samples(path: &Path) -> Result<Vec<i16>> {
    let reader = WavReader::open(path)?;
    Ok(reader.into_samples::<i16>().collect::<Result<Vec<_>, _>>()?)
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

fn setup() -> (TempDir, ChunkStore, SessionFinalizer) {
    let temp_dir = TempDir::new().unwrap();
    let store = ChunkStore::new();
    let finalizer = SessionFinalizer::direct(store.clone(), temp_dir.path());
    finalizer.prepare().unwrap();
    (temp_dir, store, finalizer)
}

#[tokio::test]
async fn test_two_chunks_of_500_bytes() -> Result<()> {
    let (temp_dir, store, finalizer) = setup();

    store.append_chunk("abc", Chunk::new(0, vec![0u8; 500]), Some(16000));
    store.append_chunk("abc", Chunk::new(1, vec![0u8; 500]), Some(16000));

    let outcome = finalizer.finalize("abc").await?;

    assert_eq!(outcome.chunks, 2);
    assert_eq!(outcome.info.frames, 500);
    assert_eq!(outcome.info.data_bytes(), 1000);
    assert_eq!(outcome.info.sample_rate, 16000);
    assert_eq!(outcome.info.channels, 1);
    assert_eq!(outcome.info.bits_per_sample, 16);
    assert!(outcome.path.starts_with(temp_dir.path()));

    let name = outcome.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("recording_"), "{}", name);
    assert!(name.ends_with("_abc.wav"), "{}", name);

    // 44-byte canonical header plus the PCM payload
    assert_eq!(std::fs::metadata(&outcome.path)?.len(), 44 + 1000);
    assert_eq!(read_samples(&outcome.path)?.len(), 500);

    Ok(())
}

#[tokio::test]
async fn test_chunks_reassembled_in_index_order() -> Result<()> {
    let (_temp_dir, store, finalizer) = setup();

    for index in [3u64, 1, 2] {
        let value = index as i16 * 100;
        store.append_chunk("abc", Chunk::new(index, pcm(&[value, value])), Some(16000));
    }

    let outcome = finalizer.finalize("abc").await?;

    assert_eq!(read_samples(&outcome.path)?, vec![100, 100, 200, 200, 300, 300]);
    Ok(())
}

#[tokio::test]
async fn test_declared_duration_matches_frame_count() -> Result<()> {
    let (_temp_dir, store, finalizer) = setup();

    let sizes = [1600usize, 3200, 800];
    for (index, &frames) in sizes.iter().enumerate() {
        let samples: Vec<i16> = (0..frames).map(|i| (i % 1000) as i16).collect();
        store.append_chunk("dur", Chunk::new(index as u64, pcm(&samples)), Some(16000));
    }
    let n: usize = sizes.iter().sum();

    let outcome = finalizer.finalize("dur").await?;
    let info = RecordingInfo::probe(&outcome.path)?;

    assert_eq!(info.frames, n as u64);
    assert_eq!(info.duration_secs, n as f64 / 16000.0);
    assert_eq!(info, outcome.info);

    let reader = WavReader::open(&outcome.path)?;
    assert_eq!(reader.duration() as usize, n);
    assert_eq!(reader.spec().sample_rate, 16000);

    Ok(())
}

#[tokio::test]
async fn test_unknown_client_is_no_chunks() {
    let (temp_dir, _store, finalizer) = setup();

    let err = finalizer.finalize("nobody").await.unwrap_err();

    assert!(matches!(err, FinalizeError::NoChunks(ref id) if id == "nobody"));
    assert_eq!(err.kind(), ErrorKind::NoChunks);
    assert_eq!(files_in(temp_dir.path()), 0);
}

#[tokio::test]
async fn test_success_clears_session() -> Result<()> {
    let (_temp_dir, store, finalizer) = setup();
    store.append_chunk("x", Chunk::new(0, pcm(&[1, 2, 3])), Some(8000));

    finalizer.finalize("x").await?;

    assert!(!store.contains("x"));
    let err = finalizer.finalize("x").await.unwrap_err();
    assert!(matches!(err, FinalizeError::NoChunks(_)));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_indices_duplicate_audio() -> Result<()> {
    let (_temp_dir, store, finalizer) = setup();
    store.append_chunk("dup", Chunk::new(0, pcm(&[7])), Some(16000));
    store.append_chunk("dup", Chunk::new(1, pcm(&[8])), None);
    store.append_chunk("dup", Chunk::new(0, pcm(&[9])), None);

    let outcome = finalizer.finalize("dup").await?;

    assert_eq!(outcome.chunks, 3);
    assert_eq!(read_samples(&outcome.path)?, vec![7, 9, 8]);
    Ok(())
}

#[tokio::test]
async fn test_missing_sample_rate_keeps_session() {
    let (temp_dir, store, finalizer) = setup();
    store.append_chunk("norate", Chunk::new(0, pcm(&[1, 2])), None);

    let err = finalizer.finalize("norate").await.unwrap_err();

    assert!(matches!(err, FinalizeError::MissingSampleRate(_)));
    assert_eq!(err.kind(), ErrorKind::Encoding);
    assert_eq!(store.chunk_count("norate"), Some(1), "Failed finalize must retain chunks");
    assert_eq!(files_in(temp_dir.path()), 0);
}

#[tokio::test]
async fn test_default_sample_rate_fallback() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = ChunkStore::new();
    let finalizer =
        SessionFinalizer::direct(store.clone(), temp_dir.path()).with_default_sample_rate(Some(22050));

    store.append_chunk("d", Chunk::new(0, pcm(&[5; 10])), None);
    let outcome = finalizer.finalize("d").await?;

    assert_eq!(outcome.info.sample_rate, 22050);
    Ok(())
}

#[tokio::test]
async fn test_retry_after_failure_uses_all_chunks() -> Result<()> {
    let (_temp_dir, store, finalizer) = setup();
    store.append_chunk("retry", Chunk::new(0, pcm(&[1])), None);
    store.append_chunk("retry", Chunk::new(1, pcm(&[2])), None);

    assert!(finalizer.finalize("retry").await.is_err());

    // The client supplies the missing rate with its next chunk, then retries
    store.append_chunk("retry", Chunk::new(2, pcm(&[3])), Some(16000));
    let outcome = finalizer.finalize("retry").await?;

    assert_eq!(outcome.chunks, 3);
    assert_eq!(read_samples(&outcome.path)?, vec![1, 2, 3]);
    assert!(!store.contains("retry"));
    Ok(())
}

#[tokio::test]
async fn test_odd_length_chunk_fails_without_output() {
    let (temp_dir, store, finalizer) = setup();
    store.append_chunk("odd", Chunk::new(0, pcm(&[1, 2])), Some(16000));
    store.append_chunk("odd", Chunk::new(1, vec![0u8; 3]), None);

    let err = finalizer.finalize("odd").await.unwrap_err();

    assert!(matches!(
        err,
        FinalizeError::Payload(PayloadError::OddLength { index: 1, len: 3 })
    ));
    assert_eq!(files_in(temp_dir.path()), 0, "Partial output must be removed");
    assert_eq!(store.chunk_count("odd"), Some(2));
}

#[tokio::test]
async fn test_wav_fragments_are_unwrapped() -> Result<()> {
    let (_temp_dir, store, finalizer) = setup();

    // Browser worklet uploads: one self-contained WAV per chunk, no sample_rate field
    store.append_chunk("web", Chunk::new(1, wav_fragment(48000, &[30, 40])), None);
    store.append_chunk("web", Chunk::new(0, wav_fragment(48000, &[10, 20])), None);

    let outcome = finalizer.finalize("web").await?;

    assert_eq!(outcome.info.sample_rate, 48000);
    assert_eq!(read_samples(&outcome.path)?, vec![10, 20, 30, 40]);
    Ok(())
}

#[tokio::test]
async fn test_wav_fragment_rate_mismatch_rejected() {
    let (_temp_dir, store, finalizer) = setup();
    store.append_chunk("mix", Chunk::new(0, wav_fragment(44100, &[1])), Some(16000));

    let err = finalizer.finalize("mix").await.unwrap_err();

    assert!(matches!(
        err,
        FinalizeError::Payload(PayloadError::SampleRateMismatch {
            expected: 16000,
            found: 44100,
            ..
        })
    ));
}

#[tokio::test]
async fn test_same_second_finalizes_get_distinct_files() -> Result<()> {
    let (_temp_dir, store, finalizer) = setup();

    store.append_chunk("same", Chunk::new(0, pcm(&[1])), Some(16000));
    let first = finalizer.finalize("same").await?;
    store.append_chunk("same", Chunk::new(0, pcm(&[2])), Some(16000));
    let second = finalizer.finalize("same").await?;

    assert_ne!(first.path, second.path);
    assert_eq!(read_samples(&first.path)?, vec![1]);
    assert_eq!(read_samples(&second.path)?, vec![2]);
    Ok(())
}

#[tokio::test]
async fn test_unsafe_client_id_stays_in_recordings_dir() -> Result<()> {
    let (temp_dir, store, finalizer) = setup();
    store.append_chunk("../../escape", Chunk::new(0, pcm(&[1])), Some(16000));

    let outcome = finalizer.finalize("../../escape").await?;

    assert_eq!(outcome.path.parent(), Some(temp_dir.path()));
    assert_eq!(outcome.client_id, "../../escape");
    Ok(())
}

#[tokio::test]
async fn test_parallel_finalizes_do_not_mix_clients() -> Result<()> {
    let (_temp_dir, store, finalizer) = setup();
    store.append_chunk("a", Chunk::new(0, pcm(&[1; 100])), Some(16000));
    store.append_chunk("b", Chunk::new(0, pcm(&[2; 50])), Some(16000));
    store.append_chunk("a", Chunk::new(1, pcm(&[1; 100])), None);

    let (a, b) = tokio::join!(finalizer.finalize("a"), finalizer.finalize("b"));
    let (a, b) = (a?, b?);

    assert_eq!(read_samples(&a.path)?, vec![1; 200]);
    assert_eq!(read_samples(&b.path)?, vec![2; 50]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_end_requests_finalize_once() -> Result<()> {
    let (_temp_dir, store, finalizer) = setup();
    store.append_chunk("once", Chunk::new(0, pcm(&[1, 2, 3])), Some(16000));

    let attempts = futures::future::join_all((0..4).map(|_| {
        let finalizer = finalizer.clone();
        tokio::spawn(async move { finalizer.finalize("once").await })
    }))
    .await;

    let mut ok = 0;
    let mut no_chunks = 0;
    for attempt in attempts {
        match attempt? {
            Ok(_) => ok += 1,
            Err(FinalizeError::NoChunks(_)) => no_chunks += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(no_chunks, 3);
    Ok(())
}
