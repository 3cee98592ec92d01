//! Local RFC cache with on-demand retrieval.
//!
//! [`DocumentCache::resolve`] runs one pipeline per request:
//!
//! 1. bail out quietly if no cache directory is configured
//! 2. reuse an already-open document, or open the cached file
//! 3. otherwise, when downloads are enabled, fetch `rfc<N>.txt`, write it
//!    to the cache directory and open it
//! 4. apply the fragment to the opened document
//!
//! Each step blocks until its I/O completes. Requests for the same RFC
//! number are serialized so only one of them downloads the file.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;
use url::Url;

use crate::address::{self, RfcAddress};
use crate::config::Settings;
use crate::document::{DocumentHost, DocumentId, HostError};
use crate::fragment::{FragmentOutcome, apply_fragment};
use crate::paths::PathResolver;

/// Placeholder replaced with the RFC number in a download source.
pub const NUMBER_PLACEHOLDER: char = '#';

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(unix)]
const CACHED_FILE_MODE: u32 = 0o644;

/// Failure to retrieve a remote document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The download source is not a valid URL
    #[error("invalid download URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// HTTP error status
    #[error("HTTP error downloading {url}: {source}")]
    HttpError {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// I/O error while reading the response
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Failure of a cache resolution.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to download RFC {number}")]
    Fetch {
        number: u32,
        #[source]
        source: FetchError,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Open(#[from] HostError),
}

/// Retrieves the bytes behind a URL.
pub trait Fetcher {
    /// # Errors
    /// Returns an error if the URL is invalid, the transfer fails, or the
    /// server answers with a non-success status.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let url = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let response = self.client.get(url.as_str()).send()?;
        if let Err(source) = response.error_for_status_ref() {
            return Err(FetchError::HttpError { url, source });
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Why a resolution did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No cache directory is configured.
    NotConfigured,
    /// The file is not cached and downloads are disabled.
    DownloadDisabled,
}

/// Result of a successful resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Opened {
        id: DocumentId,
        outcome: FragmentOutcome,
    },
    Skipped(SkipReason),
}

/// Where RFCs are cached and how missing ones are retrieved.
pub struct DocumentCache<F = HttpFetcher> {
    resolver: PathResolver,
    fetcher: F,
    cache_dir: Option<PathBuf>,
    download_enabled: bool,
    download_source: String,
    in_flight: Mutex<HashMap<u32, Arc<Mutex<()>>>>,
}

impl<F: Fetcher> DocumentCache<F> {
    /// An unconfigured cache. Call [`Self::apply_settings`] before use.
    pub fn new(resolver: PathResolver, fetcher: F) -> Self {
        Self {
            resolver,
            fetcher,
            cache_dir: None,
            download_enabled: true,
            download_source: crate::config::DEFAULT_DOWNLOAD_SOURCE.to_string(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Pick up new settings. The cache directory is re-expanded every time.
    pub fn apply_settings(&mut self, settings: &Settings) {
        let expanded = PathBuf::from(self.resolver.expand_path(settings.cache_dir.trim()));
        self.cache_dir = if expanded.as_os_str().is_empty() {
            None
        } else if expanded.is_absolute() {
            Some(expanded)
        } else {
            tracing::warn!(
                cache_dir = %settings.cache_dir,
                expanded = %expanded.display(),
                "cache directory does not resolve to an absolute path, ignoring it"
            );
            None
        };
        self.download_enabled = settings.download_enabled;
        self.download_source.clone_from(&settings.download_source);
        tracing::debug!(
            cache_dir = ?self.cache_dir,
            download = self.download_enabled,
            source = %self.download_source,
            "cache settings applied"
        );
    }

    #[must_use]
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.apply_settings(settings);
        self
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    pub const fn download_enabled(&self) -> bool {
        self.download_enabled
    }

    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub const fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// `<cache_dir>/rfc<N>.txt`, if a cache directory is configured.
    pub fn target_path(&self, number: u32) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(address::file_name(number)))
    }

    /// The download source with every `#` replaced by `number`.
    pub fn download_url(&self, number: u32) -> String {
        self.download_source
            .replace(NUMBER_PLACEHOLDER, &number.to_string())
    }

    /// Resolve an address; see [`Self::resolve`].
    ///
    /// # Errors
    /// See [`Self::resolve`].
    pub fn open_address<H: DocumentHost>(
        &self,
        address: &RfcAddress,
        host: &mut H,
    ) -> Result<Resolution, CacheError> {
        self.resolve(address.number, address.fragment.as_deref(), host)
    }

    /// Locate, fetch if needed, open and position RFC `number`.
    ///
    /// # Errors
    /// Returns an error if the cache directory cannot be created, the
    /// download or write fails, or the host cannot open the file.
    pub fn resolve<H: DocumentHost>(
        &self,
        number: u32,
        fragment: Option<&str>,
        host: &mut H,
    ) -> Result<Resolution, CacheError> {
        let Some(target) = self.target_path(number) else {
            tracing::debug!(number, "no cache directory configured");
            return Ok(Resolution::Skipped(SkipReason::NotConfigured));
        };

        if let Some(id) = host.find_open(&target) {
            tracing::debug!(number, "already open");
            return Ok(Self::position(host, id, fragment));
        }

        if !target.is_file() {
            if !self.download_enabled {
                tracing::debug!(number, "not cached and downloads are disabled");
                return Ok(Resolution::Skipped(SkipReason::DownloadDisabled));
            }
            self.download(number, &target)?;
        }

        let id = host.open(&target)?;
        Ok(Self::position(host, id, fragment))
    }

    fn position<H: DocumentHost>(
        host: &mut H,
        id: DocumentId,
        fragment: Option<&str>,
    ) -> Resolution {
        let outcome = host
            .editor_mut(id)
            .map_or(FragmentOutcome::Unchanged, |editor| apply_fragment(fragment, editor));
        Resolution::Opened { id, outcome }
    }

    /// Fetch RFC `number` into `target` unless another request already did.
    fn download(&self, number: u32, target: &Path) -> Result<(), CacheError> {
        let lock = self.lock_for(number);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if target.is_file() {
            tracing::debug!(number, "fetched by a concurrent request");
            return Ok(());
        }

        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|source| CacheError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let url = self.download_url(number);
        tracing::info!(number, %url, "downloading RFC");
        let bytes = self
            .fetcher
            .fetch(&url)
            .map_err(|source| CacheError::Fetch { number, source })?;

        write_atomic(dir, target, &bytes).map_err(|source| CacheError::Write {
            path: target.to_path_buf(),
            source,
        })?;
        tracing::info!(number, bytes = bytes.len(), path = %target.display(), "cached RFC");
        Ok(())
    }

    fn lock_for(&self, number: u32) -> Arc<Mutex<()>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(number).or_default())
    }
}

// Write through a temporary file in the same directory so readers never see
// a partial document.
fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    // Temp files are created owner-only; cached RFCs are world-readable.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(CACHED_FILE_MODE))?;
    }
    file.persist(target).map_err(|err| err.error)?;
    Ok(())
}

impl<F> std::fmt::Debug for DocumentCache<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("cache_dir", &self.cache_dir)
            .field("download_enabled", &self.download_enabled)
            .field("download_source", &self.download_source)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Editor, Point, Workspace};
    use crate::paths::{NoDirectoryService, UserDirectory};
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves canned bytes and records requested URLs.
    #[derive(Default)]
    struct StubFetcher {
        body: Option<Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl Fetcher for StubFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requests.borrow_mut().push(url.to_string());
            self.body.clone().ok_or_else(|| {
                FetchError::IoError(io::Error::new(io::ErrorKind::ConnectionRefused, "offline"))
            })
        }
    }

    fn resolver(home: &Path) -> PathResolver {
        PathResolver::new(
            Some(home.to_path_buf()),
            UserDirectory::new(home.join("passwd"), Box::new(NoDirectoryService)),
        )
    }

    fn cache(home: &Path, fetcher: StubFetcher, download: bool) -> DocumentCache<StubFetcher> {
        let settings = Settings {
            cache_dir: "~/rfc".to_string(),
            download_enabled: download,
            download_source: "https://mirror.test/rfc#/rfc#.txt".to_string(),
            ..Settings::default()
        };
        DocumentCache::new(resolver(home), fetcher).with_settings(&settings)
    }

    const DOC: &str = "RFC 2223\n\n1.  Intro\n\u{c}\n2.  More\n";

    #[test]
    fn test_apply_settings_expands_cache_dir() {
        let home = tempfile::tempdir().unwrap();
        let cache = cache(home.path(), StubFetcher::default(), true);
        assert_eq!(cache.cache_dir(), Some(home.path().join("rfc").as_path()));
        assert_eq!(
            cache.target_path(2223),
            Some(home.path().join("rfc").join("rfc2223.txt"))
        );
    }

    #[test]
    fn test_download_url_replaces_every_placeholder() {
        let home = tempfile::tempdir().unwrap();
        let cache = cache(home.path(), StubFetcher::default(), true);
        assert_eq!(cache.download_url(791), "https://mirror.test/rfc791/rfc791.txt");
    }

    #[test]
    fn test_unconfigured_cache_is_noop() {
        let home = tempfile::tempdir().unwrap();
        let cache = DocumentCache::new(resolver(home.path()), StubFetcher::default());
        let mut ws = Workspace::new();
        let result = cache.resolve(1, None, &mut ws).unwrap();
        assert_eq!(result, Resolution::Skipped(SkipReason::NotConfigured));
        assert!(ws.is_empty());
    }

    #[test]
    fn test_empty_cache_dir_setting_unconfigures() {
        let home = tempfile::tempdir().unwrap();
        let mut cache = cache(home.path(), StubFetcher::default(), true);
        cache.apply_settings(&Settings {
            cache_dir: String::new(),
            ..Settings::default()
        });
        assert_eq!(cache.cache_dir(), None);
    }

    #[test]
    fn test_cached_file_is_opened_without_fetch() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join("rfc");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("rfc2223.txt"), DOC).unwrap();

        let cache = cache(home.path(), StubFetcher::default(), false);
        let mut ws = Workspace::new();
        let result = cache.resolve(2223, Some("page-2"), &mut ws).unwrap();

        let Resolution::Opened { id, outcome } = result else {
            panic!("expected an opened document, got {result:?}");
        };
        assert_eq!(outcome, FragmentOutcome::Page(Point::new(4, 0)));
        assert_eq!(ws.editor(id).unwrap().selection().start, Point::new(4, 0));
        assert!(cache.fetcher.requests.borrow().is_empty());
    }

    #[test]
    fn test_open_document_is_reused() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join("rfc");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("rfc2223.txt"), DOC).unwrap();

        let cache = cache(home.path(), StubFetcher::default(), false);
        let mut ws = Workspace::new();
        let first = cache.resolve(2223, None, &mut ws).unwrap();
        let second = cache.resolve(2223, Some("L3"), &mut ws).unwrap();

        let (Resolution::Opened { id: a, .. }, Resolution::Opened { id: b, outcome }) =
            (first, second)
        else {
            panic!("expected both requests to open");
        };
        assert_eq!(a, b);
        assert_eq!(ws.len(), 1);
        assert!(matches!(outcome, FragmentOutcome::Selected(_)));
    }

    #[test]
    fn test_missing_file_with_downloads_disabled_is_noop() {
        let home = tempfile::tempdir().unwrap();
        let cache = cache(home.path(), StubFetcher::default(), false);
        let mut ws = Workspace::new();

        let result = cache.resolve(9999, None, &mut ws).unwrap();
        assert_eq!(result, Resolution::Skipped(SkipReason::DownloadDisabled));
        assert!(!home.path().join("rfc").join("rfc9999.txt").exists());
        assert!(ws.is_empty());
        assert!(ws.notifications().is_empty());
    }

    #[test]
    fn test_missing_file_is_fetched_written_and_opened() {
        let home = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher {
            body: Some(DOC.as_bytes().to_vec()),
            ..StubFetcher::default()
        };
        let cache = cache(home.path(), fetcher, true);
        let mut ws = Workspace::new();

        let result = cache.resolve(2223, Some("section-2"), &mut ws).unwrap();

        let target = home.path().join("rfc").join("rfc2223.txt");
        assert_eq!(std::fs::read(&target).unwrap(), DOC.as_bytes());
        assert_eq!(
            cache.fetcher.requests.borrow().as_slice(),
            &["https://mirror.test/rfc2223/rfc2223.txt".to_string()]
        );
        let Resolution::Opened { outcome, .. } = result else {
            panic!("expected an opened document, got {result:?}");
        };
        assert_eq!(outcome, FragmentOutcome::Marker(Point::new(4, 0)));
    }

    #[test]
    fn test_second_request_uses_cached_copy() {
        let home = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher {
            body: Some(DOC.as_bytes().to_vec()),
            ..StubFetcher::default()
        };
        let cache = cache(home.path(), fetcher, true);

        cache.resolve(2223, None, &mut Workspace::new()).unwrap();
        cache.resolve(2223, None, &mut Workspace::new()).unwrap();
        assert_eq!(cache.fetcher.requests.borrow().len(), 1);
    }

    #[test]
    fn test_fetch_failure_is_error_and_writes_nothing() {
        let home = tempfile::tempdir().unwrap();
        let cache = cache(home.path(), StubFetcher::default(), true);
        let mut ws = Workspace::new();

        let err = cache.resolve(42, None, &mut ws).unwrap_err();
        assert!(matches!(err, CacheError::Fetch { number: 42, .. }));
        assert!(!home.path().join("rfc").join("rfc42.txt").exists());
        assert!(ws.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_uncreatable_cache_dir_is_error() {
        let home = tempfile::tempdir().unwrap();
        // A regular file where the cache directory should be.
        std::fs::write(home.path().join("rfc"), "").unwrap();
        let fetcher = StubFetcher {
            body: Some(b"x".to_vec()),
            ..StubFetcher::default()
        };
        let cache = cache(home.path(), fetcher, true);

        let err = cache.resolve(7, None, &mut Workspace::new()).unwrap_err();
        assert!(matches!(err, CacheError::CreateDir { .. }));
    }

    #[test]
    fn test_unexpanded_tilde_leaves_cache_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let homeless = PathResolver::new(
            None,
            UserDirectory::new(dir.path().join("passwd"), Box::new(NoDirectoryService)),
        );
        let fetcher = StubFetcher {
            body: Some(DOC.as_bytes().to_vec()),
            ..StubFetcher::default()
        };
        let cache = DocumentCache::new(homeless, fetcher).with_settings(&Settings {
            cache_dir: "~/rfc".to_string(),
            ..Settings::default()
        });
        assert_eq!(cache.cache_dir(), None);

        let mut ws = Workspace::new();
        let result = cache.resolve(7, None, &mut ws).unwrap();
        assert_eq!(result, Resolution::Skipped(SkipReason::NotConfigured));
        assert!(cache.fetcher.requests.borrow().is_empty());
        assert!(ws.is_empty());
    }

    #[test]
    fn test_unknown_user_leaves_cache_unconfigured() {
        let home = tempfile::tempdir().unwrap();
        let mut cache = cache(home.path(), StubFetcher::default(), true);
        cache.apply_settings(&Settings {
            cache_dir: "~nosuchuser/rfc".to_string(),
            ..Settings::default()
        });
        assert_eq!(cache.cache_dir(), None);
    }

    /// Counts fetches and holds each one long enough for callers to pile up.
    struct SlowFetcher {
        calls: AtomicUsize,
    }

    impl Fetcher for SlowFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(150));
            Ok(DOC.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_concurrent_requests_fetch_once() {
        let home = tempfile::tempdir().unwrap();
        let settings = Settings {
            cache_dir: "~/rfc".to_string(),
            ..Settings::default()
        };
        let fetcher = SlowFetcher {
            calls: AtomicUsize::new(0),
        };
        let cache = DocumentCache::new(resolver(home.path()), fetcher).with_settings(&settings);

        let shared = &cache;
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(move || {
                        let mut ws = Workspace::new();
                        matches!(
                            shared.resolve(5, None, &mut ws),
                            Ok(Resolution::Opened { .. })
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results, vec![true; 4]);
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 1);
        let cached = std::fs::read(home.path().join("rfc").join("rfc5.txt")).unwrap();
        assert_eq!(cached, DOC.as_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn test_cached_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let home = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher {
            body: Some(DOC.as_bytes().to_vec()),
            ..StubFetcher::default()
        };
        let cache = cache(home.path(), fetcher, true);
        cache.resolve(3, None, &mut Workspace::new()).unwrap();

        let target = home.path().join("rfc").join("rfc3.txt");
        let mode = std::fs::metadata(target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, CACHED_FILE_MODE);
    }

    #[test]
    fn test_http_fetcher_returns_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/rfc/rfc2223.txt")
            .with_status(200)
            .with_body(DOC)
            .create();

        let fetcher = HttpFetcher::new().unwrap();
        let body = fetcher
            .fetch(&format!("{}/rfc/rfc2223.txt", server.url()))
            .unwrap();
        assert_eq!(body, DOC.as_bytes());
        mock.assert();
    }

    #[test]
    fn test_http_fetcher_reports_status() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/rfc/rfc1.txt").with_status(404).create();

        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher
            .fetch(&format!("{}/rfc/rfc1.txt", server.url()))
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpError { .. }));
    }

    #[test]
    fn test_http_fetcher_rejects_bad_url() {
        let fetcher = HttpFetcher::new().unwrap();
        assert!(matches!(
            fetcher.fetch("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }
}
