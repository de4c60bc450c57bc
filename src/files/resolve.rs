use std::io::{BufRead, Write};
use std::path::Path;

use log::info;

use super::download::{Fetch, HttpDownloader};

/// Answers the "download it now?" question when auto-download is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompter {
    AlwaysYes,
    AlwaysNo,
    /// Ask on stdout and read a `y`/`n` line from stdin.
    Interactive,
}

impl Prompter {
    pub fn confirm(&self, question: &str) -> bool {
        match self {
            Prompter::AlwaysYes => true,
            Prompter::AlwaysNo => false,
            Prompter::Interactive => {
                let stdin = std::io::stdin();
                ask(question, &mut stdin.lock(), &mut std::io::stdout())
            }
        }
    }
}

fn ask(question: &str, input: &mut impl BufRead, output: &mut impl Write) -> bool {
    // a closed stdout only loses the question, the answer still counts
    let _ = write!(output, "{question} [y/n] ");
    let _ = output.flush();
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
        Err(_) => false,
    }
}

/// What to do about a missing cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadPolicy {
    pub auto_download: bool,
    pub prompter: Prompter,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            auto_download: true,
            prompter: Prompter::AlwaysYes,
        }
    }
}

/// Result of [`CacheResolver::ensure_local`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// File was already on disk.
    Present,
    Downloaded,
    /// Download attempted but failed (already logged).
    Failed,
    /// Operator said no.
    Declined,
}

/// Turns a catalog entry's absolute path into a (best-effort) local file.
pub struct CacheResolver {
    policy: DownloadPolicy,
    downloader: Box<dyn Fetch>,
}

impl CacheResolver {
    pub fn new(policy: DownloadPolicy, downloader: Box<dyn Fetch>) -> Self {
        Self { policy, downloader }
    }

    /// Resolver using the HTTP downloader.
    pub fn http(policy: DownloadPolicy) -> Self {
        Self::new(policy, Box::new(HttpDownloader::new()))
    }

    pub fn policy(&self) -> DownloadPolicy {
        self.policy
    }

    /// Download `url` to `abs_path` unless the file already exists, asking the
    /// prompter first when auto-download is disabled. `label` names the entry
    /// in the prompt and log output.
    pub fn ensure_local(&self, abs_path: &Path, label: &str, url: &str) -> Resolution {
        if abs_path.is_file() {
            return Resolution::Present;
        }

        let proceed = self.policy.auto_download
            || self.policy.prompter.confirm(&format!(
                "{:?} associated with label={label:?} does not exist. Download it now \
                 from {url:?}? This will cache the file for future use.",
                abs_path.display().to_string()
            ));
        if !proceed {
            return Resolution::Declined;
        }

        info!("Downloading {label:?} from {url:?} to {}", abs_path.display());
        if self.downloader.fetch(url, abs_path) {
            Resolution::Downloaded
        } else {
            Resolution::Failed
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::rc::Rc;

    use super::*;

    /// Records every call and writes canned bodies instead of hitting the network.
    #[derive(Clone, Default)]
    pub(crate) struct FakeFetch {
        pub calls: Rc<RefCell<Vec<(String, PathBuf)>>>,
        pub bodies: Rc<HashMap<String, String>>,
    }

    impl FakeFetch {
        pub fn serving(bodies: &[(&str, &str)]) -> Self {
            Self {
                calls: Rc::default(),
                bodies: Rc::new(
                    bodies
                        .iter()
                        .map(|(u, b)| (u.to_string(), b.to_string()))
                        .collect(),
                ),
            }
        }

        pub fn n_calls(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl Fetch for FakeFetch {
        fn fetch(&self, url: &str, dest: &Path) -> bool {
            self.calls
                .borrow_mut()
                .push((url.to_string(), dest.to_path_buf()));
            let Some(body) = self.bodies.get(url) else {
                return false;
            };
            if let Some(dir) = dest.parent() {
                std::fs::create_dir_all(dir).unwrap();
            }
            std::fs::write(dest, body).unwrap();
            true
        }
    }

    fn resolver(auto_download: bool, prompter: Prompter, fetch: &FakeFetch) -> CacheResolver {
        CacheResolver::new(
            DownloadPolicy {
                auto_download,
                prompter,
            },
            Box::new(fetch.clone()),
        )
    }

    #[test]
    fn test_ask_parses_answer() {
        let mut out = Vec::new();
        assert!(ask("go?", &mut Cursor::new(" Y \n"), &mut out));
        assert!(!ask("go?", &mut Cursor::new("n\n"), &mut out));
        assert!(!ask("go?", &mut Cursor::new(""), &mut out));
        assert!(String::from_utf8(out).unwrap().starts_with("go? [y/n]"));
    }

    #[test]
    fn test_present_file_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "x\n").unwrap();
        let fetch = FakeFetch::default();
        let r = resolver(true, Prompter::AlwaysYes, &fetch);
        assert_eq!(r.ensure_local(&path, "a", "https://x/a.csv"), Resolution::Present);
        assert_eq!(fetch.n_calls(), 0);
    }

    #[test]
    fn test_auto_download_skips_prompter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/a.csv");
        let fetch = FakeFetch::serving(&[("https://x/a.csv", "x\n1\n")]);
        let r = resolver(true, Prompter::AlwaysNo, &fetch);
        assert_eq!(r.ensure_local(&path, "a", "https://x/a.csv"), Resolution::Downloaded);
        assert!(path.is_file());
        assert_eq!(r.ensure_local(&path, "a", "https://x/a.csv"), Resolution::Present);
        assert_eq!(fetch.n_calls(), 1);
    }

    #[test]
    fn test_declined_download_leaves_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        let fetch = FakeFetch::serving(&[("https://x/a.csv", "x\n")]);
        let r = resolver(false, Prompter::AlwaysNo, &fetch);
        assert_eq!(r.ensure_local(&path, "a", "https://x/a.csv"), Resolution::Declined);
        assert_eq!(fetch.n_calls(), 0);
        assert!(!path.exists());

        let r = resolver(false, Prompter::AlwaysYes, &fetch);
        assert_eq!(r.ensure_local(&path, "a", "https://x/a.csv"), Resolution::Downloaded);
    }

    #[test]
    fn test_failed_fetch_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        let fetch = FakeFetch::default();
        let r = resolver(true, Prompter::AlwaysYes, &fetch);
        assert_eq!(r.ensure_local(&path, "a", "https://x/404"), Resolution::Failed);
        assert!(!path.exists());
    }
}
