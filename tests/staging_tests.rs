mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use common::harness::TestHarness;
use common::mocks::FailingCorpus;
use common::vectors::{le_bytes, random_bytes, random_vectors};
use graphlift::corpus::{InMemoryCorpus, VectorCorpus, VectorCursorStream};
use graphlift::error::GraphliftError;
use graphlift::staging::{write_chunks_in_order, NoopListener, PartSpec, TransferListener};

/// Records every progress callback.
#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<(String, u64, u64)>>,
}

impl TransferListener for RecordingListener {
    fn on_started(&self, _key: &str, bytes: u64) {
        self.events.lock().unwrap().push(("started".into(), 0, bytes));
    }

    fn on_progress(&self, _key: &str, transferred: u64, total: u64) {
        self.events
            .lock()
            .unwrap()
            .push(("progress".into(), transferred, total));
    }

    fn on_complete(&self, _key: &str, total: u64) {
        self.events.lock().unwrap().push(("complete".into(), total, total));
    }
}

async fn upload_corpus(
    harness: &TestHarness,
    key: &str,
    corpus: Arc<dyn VectorCorpus>,
    part_size: usize,
    calls: Arc<AtomicUsize>,
) -> graphlift::error::Result<u64> {
    let total = corpus.total_bytes();
    harness
        .staging(part_size, 1024)
        .upload(
            key,
            total,
            move |part: PartSpec| {
                calls.fetch_add(1, Ordering::SeqCst);
                VectorCursorStream::open(corpus.as_ref(), part.offset, Some(part.length))
            },
            &NoopListener,
        )
        .await
}

#[tokio::test]
async fn test_multipart_upload_round_trip() {
    for harness in [TestHarness::new(), TestHarness::on_disk()] {
        let vectors = random_vectors(100, 16);
        let corpus: Arc<dyn VectorCorpus> =
            Arc::new(InMemoryCorpus::from_vectors(16, vectors.clone()).unwrap());
        let key = harness.key("vectors.knnvec");
        let calls = Arc::new(AtomicUsize::new(0));

        // 6400 bytes in parts of 1024: six full parts and a remainder of 256.
        let sent = upload_corpus(&harness, &key, corpus, 1024, calls.clone())
            .await
            .unwrap();
        assert_eq!(sent, 6400);
        assert_eq!(calls.load(Ordering::SeqCst), 7);

        let stored = harness.store.get(&key).await.unwrap();
        assert_eq!(stored.as_ref(), le_bytes(&vectors).as_slice());
    }
}

#[tokio::test]
async fn test_single_stream_upload_reads_once() {
    let harness = TestHarness::single_stream();
    let vectors = random_vectors(40, 8);
    let corpus: Arc<dyn VectorCorpus> =
        Arc::new(InMemoryCorpus::from_vectors(8, vectors.clone()).unwrap());
    let key = harness.key("vectors.knnvec");
    let calls = Arc::new(AtomicUsize::new(0));

    let sent = upload_corpus(&harness, &key, corpus, 64, calls.clone())
        .await
        .unwrap();
    assert_eq!(sent, 40 * 8 * 4);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.store.get(&key).await.unwrap().as_ref(),
        le_bytes(&vectors).as_slice()
    );
}

#[tokio::test]
async fn test_failed_part_leaves_no_object() {
    for harness in [TestHarness::new(), TestHarness::on_disk()] {
        let inner = InMemoryCorpus::from_vectors(4, random_vectors(64, 4)).unwrap();
        // Vector 40 sits in the third 256-byte part.
        let corpus: Arc<dyn VectorCorpus> = Arc::new(FailingCorpus::new(inner, 40));
        let key = harness.key("vectors.knnvec");

        let err = upload_corpus(&harness, &key, corpus, 256, Arc::new(AtomicUsize::new(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphliftError::Transfer { .. }), "got {err}");
        assert!(!harness.store.exists(&key).await.unwrap());
        assert!(matches!(
            harness.store.get(&key).await,
            Err(GraphliftError::NotFound { .. })
        ));
    }
}

#[tokio::test]
async fn test_short_part_is_transfer_error() {
    let harness = TestHarness::new();
    let corpus: Arc<dyn VectorCorpus> =
        Arc::new(InMemoryCorpus::from_vectors(2, random_vectors(10, 2)).unwrap());
    let key = harness.key("vectors.knnvec");

    // Claim more bytes than the corpus holds; the last part comes up short.
    let err = harness
        .staging(32, 1024)
        .upload(
            &key,
            corpus.total_bytes() + 16,
            move |part: PartSpec| {
                VectorCursorStream::open(corpus.as_ref(), part.offset, Some(part.length))
            },
            &NoopListener,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GraphliftError::Transfer { .. }));
    assert!(!harness.store.exists(&key).await.unwrap());
}

#[tokio::test]
async fn test_existing_destination_rejected() {
    let harness = TestHarness::new();
    let key = harness.key("taken.knnvec");
    harness
        .store
        .put(&key, Bytes::from_static(b"original"))
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let corpus: Arc<dyn VectorCorpus> =
        Arc::new(InMemoryCorpus::from_vectors(2, random_vectors(4, 2)).unwrap());
    let err = upload_corpus(&harness, &key, corpus, 8, calls.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, GraphliftError::AlreadyExists { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.store.get(&key).await.unwrap().as_ref(), b"original");

    let err = harness
        .staging(8, 8)
        .upload_bytes(&key, Bytes::from_static(b"ids"), &NoopListener)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphliftError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_upload_reports_progress() {
    let harness = TestHarness::new();
    let corpus: Arc<dyn VectorCorpus> =
        Arc::new(InMemoryCorpus::from_vectors(4, random_vectors(16, 4)).unwrap());
    let listener = RecordingListener::default();
    let key = harness.key("vectors.knnvec");

    harness
        .staging(64, 64)
        .upload(
            &key,
            256,
            move |part: PartSpec| {
                VectorCursorStream::open(corpus.as_ref(), part.offset, Some(part.length))
            },
            &listener,
        )
        .await
        .unwrap();

    let events = listener.events.lock().unwrap();
    assert_eq!(events.first().unwrap(), &("started".to_string(), 0, 256));
    assert_eq!(events.last().unwrap(), &("complete".to_string(), 256, 256));
    let progress: Vec<u64> = events
        .iter()
        .filter(|e| e.0 == "progress")
        .map(|e| e.1)
        .collect();
    assert_eq!(progress, vec![64, 128, 192, 256]);
}

#[tokio::test]
async fn test_download_reassembles_chunks() {
    for harness in [TestHarness::new(), TestHarness::on_disk()] {
        let data = random_bytes(10_007, 7);
        let key = harness.key("graph.faiss");
        harness.store.put(&key, Bytes::from(data.clone())).await.unwrap();

        let mut sink = Vec::new();
        let written = harness
            .staging(1024, 333)
            .download(&key, &mut sink, &NoopListener)
            .await
            .unwrap();
        assert_eq!(written, 10_007);
        assert_eq!(sink, data);
    }
}

#[tokio::test]
async fn test_download_missing_object_writes_nothing() {
    let harness = TestHarness::new();
    let mut sink = Vec::new();
    let err = harness
        .staging(1024, 16)
        .download(&harness.key("missing"), &mut sink, &NoopListener)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphliftError::NotFound { .. }));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_empty_object_downloads_empty() {
    let harness = TestHarness::new();
    let key = harness.key("empty");
    harness.store.put(&key, Bytes::new()).await.unwrap();

    let mut sink = Vec::new();
    let written = harness
        .staging(1024, 16)
        .download(&key, &mut sink, &NoopListener)
        .await
        .unwrap();
    assert_eq!(written, 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_chunk_order_independent_of_arrival() {
    let data = random_bytes(50, 3);
    let chunks: Vec<(usize, Bytes)> = data
        .chunks(7)
        .enumerate()
        .map(|(i, c)| (i, Bytes::copy_from_slice(c)))
        .collect();
    let count = chunks.len();

    // Every arrival order of the first four chunks, with the rest shuffled.
    let mut rng = StdRng::seed_from_u64(11);
    let head: Vec<usize> = (0..4).collect();
    for perm in permutations(&head) {
        let mut order: Vec<usize> = perm.clone();
        let mut tail: Vec<usize> = (4..count).collect();
        tail.shuffle(&mut rng);
        order.extend(tail);

        let arrived: Vec<(usize, Bytes)> = order.iter().map(|&i| chunks[i].clone()).collect();
        let mut sink = Vec::new();
        let written = write_chunks_in_order("k", arrived, count, &mut sink)
            .await
            .unwrap();
        assert_eq!(written, 50);
        assert_eq!(sink, data, "arrival order {order:?}");
    }
}

#[tokio::test]
async fn test_duplicate_chunk_rejected() {
    let mut sink = Vec::new();
    let chunks = vec![
        (0, Bytes::from_static(b"aa")),
        (0, Bytes::from_static(b"aa")),
    ];
    let err = write_chunks_in_order("k", chunks, 2, &mut sink)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphliftError::PartialTransfer { chunk: 0, .. }));
    assert!(sink.is_empty());
}

fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let first = rest.remove(i);
        for mut perm in permutations(&rest) {
            perm.insert(0, first);
            out.push(perm);
        }
    }
    out
}
