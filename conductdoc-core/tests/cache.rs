use chrono::{DateTime, Duration, TimeZone, Utc};
use conductdoc_core::cache::{CacheError, CacheKey, Invalidation, SqliteArtifactCache};
use conductdoc_core::contract::ArtifactCache;
use conductdoc_core::model::{Artifact, ArtifactMetadata, SynthesisOutcome};
use tempfile::tempdir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn artifact(repo_url: &str) -> Artifact {
    Artifact {
        overview: SynthesisOutcome::Generated("# Overview".into()),
        architecture: "```mermaid\ngraph TD\n```".into(),
        modules: vec![],
        metadata: ArtifactMetadata {
            repo_name: "demo".into(),
            repo_url: repo_url.into(),
            generated_at: t0(),
            total_modules: 0,
            total_files: 0,
        },
        doc_url: Some("/docs/demo_docs.html".into()),
    }
}

#[test]
fn cache_key_is_deterministic_sha256_hex() {
    let a = CacheKey::for_repository("https://github.com/psf/requests");
    let b = CacheKey::for_repository("https://github.com/psf/requests");
    let c = CacheKey::for_repository("https://github.com/psf/requests.git");

    assert_eq!(a, b);
    assert_ne!(a, c, "distinct urls must not share a key");
    assert_eq!(a.as_str().len(), 64);
    assert!(a.as_str().chars().all(|ch| ch.is_ascii_hexdigit()));
    assert_eq!(
        CacheKey::for_repository("").as_str(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn get_after_put_returns_equal_artifact_and_is_idempotent() {
    let cache = SqliteArtifactCache::in_memory().expect("in-memory cache should open");
    let url = "https://github.com/org/demo";
    let key = CacheKey::for_repository(url);
    let stored = artifact(url);

    cache.put(&key, url, &stored, t0(), Duration::days(7));

    let first = cache.get(&key, t0()).expect("get should succeed");
    let second = cache.get(&key, t0()).expect("get should succeed");
    assert_eq!(first.as_ref(), Some(&stored));
    assert_eq!(first, second, "repeated reads without a write must agree");
}

#[test]
fn expiry_boundary_is_exclusive() {
    let cache = SqliteArtifactCache::in_memory().unwrap();
    let url = "https://github.com/org/demo";
    let key = CacheKey::for_repository(url);
    let ttl = Duration::hours(1);
    cache.put(&key, url, &artifact(url), t0(), ttl);

    let expiry = t0() + ttl;
    assert!(
        cache.get(&key, expiry - Duration::milliseconds(1)).unwrap().is_some(),
        "one millisecond before expiry should hit"
    );
    assert!(
        cache.get(&key, expiry).unwrap().is_none(),
        "reading exactly at expiry should miss"
    );
}

#[test]
fn expiry_is_compared_below_millisecond_precision() {
    let cache = SqliteArtifactCache::in_memory().unwrap();
    let url = "https://github.com/org/demo";
    let key = CacheKey::for_repository(url);
    let written = t0() + Duration::microseconds(250);
    let ttl = Duration::seconds(30);
    cache.put(&key, url, &artifact(url), written, ttl);

    let expiry = written + ttl;
    assert!(
        cache.get(&key, expiry - Duration::microseconds(1)).unwrap().is_some(),
        "the last microsecond before expiry should still hit"
    );
    assert!(cache.get(&key, expiry).unwrap().is_none());
    assert_eq!(cache.stats(expiry - Duration::microseconds(1)).unwrap().active, 1);
}

#[test]
fn put_replaces_existing_entry() {
    let cache = SqliteArtifactCache::in_memory().unwrap();
    let url = "https://github.com/org/demo";
    let key = CacheKey::for_repository(url);

    cache.put(&key, url, &artifact(url), t0(), Duration::days(1));
    let mut newer = artifact(url);
    newer.overview = SynthesisOutcome::Failed("backend down".into());
    cache.put(&key, url, &newer, t0(), Duration::days(1));

    assert_eq!(cache.get(&key, t0()).unwrap(), Some(newer));
    assert_eq!(cache.stats(t0()).unwrap().total, 1);
}

#[test]
fn non_positive_ttl_is_rejected_without_failing_put() {
    let cache = SqliteArtifactCache::in_memory().unwrap();
    let url = "https://github.com/org/demo";
    let key = CacheKey::for_repository(url);

    let err = cache
        .try_put(&key, url, &artifact(url), t0(), Duration::zero())
        .expect_err("zero ttl must be rejected");
    assert!(matches!(err, CacheError::InvalidTtl(_)));

    // The infallible form swallows the same failure.
    cache.put(&key, url, &artifact(url), t0(), Duration::seconds(-5));
    assert!(cache.get(&key, t0()).unwrap().is_none());
}

#[test]
fn sweep_removes_only_entries_past_expiry() {
    let cache = SqliteArtifactCache::in_memory().unwrap();
    let short = "https://github.com/org/short";
    let long = "https://github.com/org/long";
    cache.put(&CacheKey::for_repository(short), short, &artifact(short), t0(), Duration::minutes(1));
    cache.put(&CacheKey::for_repository(long), long, &artifact(long), t0(), Duration::days(1));

    let later = t0() + Duration::minutes(10);
    let stats = cache.stats(later).unwrap();
    assert_eq!((stats.total, stats.active, stats.expired), (2, 1, 1));
    assert!(stats.size_bytes > 0);

    // Expired rows stay until a sweep.
    assert_eq!(cache.sweep_expired(later).unwrap(), 1);
    let stats = cache.stats(later).unwrap();
    assert_eq!((stats.total, stats.active, stats.expired), (1, 1, 0));
}

#[test]
fn size_counts_bytes_not_characters() {
    let ascii = SqliteArtifactCache::in_memory().unwrap();
    let wide = SqliteArtifactCache::in_memory().unwrap();
    let url = "https://github.com/org/demo";
    let key = CacheKey::for_repository(url);

    let mut plain = artifact(url);
    plain.overview = SynthesisOutcome::Generated("a".repeat(400));
    let mut accented = artifact(url);
    accented.overview = SynthesisOutcome::Generated("é".repeat(400));

    ascii.put(&key, url, &plain, t0(), Duration::days(1));
    wide.put(&key, url, &accented, t0(), Duration::days(1));

    let plain_size = ascii.stats(t0()).unwrap().size_bytes;
    let wide_size = wide.stats(t0()).unwrap().size_bytes;
    assert_eq!(wide_size - plain_size, 400, "each é is two bytes in UTF-8");
}

#[test]
fn invalidate_by_repository_and_all() {
    let cache = SqliteArtifactCache::in_memory().unwrap();
    let urls = [
        "https://github.com/org/a",
        "https://github.com/org/b",
        "https://github.com/org/c",
    ];
    for url in urls {
        cache.put(&CacheKey::for_repository(url), url, &artifact(url), t0(), Duration::days(1));
    }

    let removed = cache
        .invalidate(&Invalidation::Repository(urls[0].to_string()))
        .unwrap();
    assert_eq!(removed, 1);
    assert!(cache.get(&CacheKey::for_repository(urls[0]), t0()).unwrap().is_none());

    assert_eq!(cache.invalidate(&Invalidation::All).unwrap(), 2);
    assert_eq!(cache.stats(t0()).unwrap().total, 0);
}

#[test]
fn entries_survive_reopening_the_database() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("nested").join("cache.db");
    let url = "https://github.com/org/demo";
    let key = CacheKey::for_repository(url);

    let cache = SqliteArtifactCache::open(&db_path).expect("file-backed cache should open");
    cache.put(&key, url, &artifact(url), t0(), Duration::days(7));
    cache.close().expect("close should succeed");

    let reopened = SqliteArtifactCache::open(&db_path).unwrap();
    assert_eq!(reopened.db_path(), db_path.as_path());
    assert_eq!(reopened.get(&key, t0()).unwrap(), Some(artifact(url)));
}
