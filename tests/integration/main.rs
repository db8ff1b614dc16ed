//! Integration tests for urlcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Isolated environment: private config path and cache dir
    struct Env {
        temp: TempDir,
    }

    impl Env {
        fn new() -> Self {
            Self {
                temp: TempDir::new().unwrap(),
            }
        }

        fn cache_dir(&self) -> PathBuf {
            self.temp.path().join("cache")
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("urlcache");
            cmd.env_remove("URLCACHE_DIR")
                .arg("--config")
                .arg(self.temp.path().join("config.toml"))
                .arg("--dir")
                .arg(self.cache_dir());
            cmd
        }

        fn init(&self) {
            self.cmd().arg("init").assert().success();
        }

        fn source(&self, name: &str, body: &[u8]) -> String {
            let path = self.temp.path().join(name);
            fs::write(&path, body).unwrap();
            file_url(&path)
        }
    }

    fn file_url(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("urlcache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Multi-process URL fetch cache"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("urlcache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("urlcache"));
    }

    #[test]
    fn init_creates_cache_dir() {
        let env = Env::new();
        env.cmd()
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Created cache directory"));
        assert!(env.cache_dir().is_dir());
    }

    #[test]
    fn get_without_cache_dir_fails_with_hint() {
        let env = Env::new();
        env.cmd()
            .args(["get", "http://x/a"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache directory not found"))
            .stderr(predicate::str::contains("urlcache init"));
    }

    #[test]
    fn get_prints_content_and_publishes_slot() {
        let env = Env::new();
        env.init();
        let url = env.source("a.txt", b"first body");

        env.cmd()
            .args(["get", &url])
            .assert()
            .success()
            .stdout("first body");

        assert_eq!(
            fs::read_to_string(env.cache_dir().join("index")).unwrap(),
            format!("{}\n", url)
        );
        assert_eq!(fs::read(env.cache_dir().join("0")).unwrap(), b"first body");
        assert!(!env.cache_dir().join("0-fetching").exists());
    }

    #[test]
    fn cached_content_survives_source_changes() {
        let env = Env::new();
        env.init();
        let url = env.source("a.txt", b"original");

        env.cmd().args(["get", &url]).assert().success();
        env.source("a.txt", b"changed upstream");

        env.cmd()
            .args(["get", &url])
            .assert()
            .success()
            .stdout("original");
    }

    #[test]
    fn get_path_prints_slot_file() {
        let env = Env::new();
        env.init();
        let first = env.source("a.txt", b"a");
        let second = env.source("b.txt", b"b");

        env.cmd().args(["get", &first]).assert().success();
        env.cmd()
            .args(["get", "--path", &second])
            .assert()
            .success()
            .stdout(predicate::str::ends_with("/1\n"));
    }

    #[test]
    fn failed_fetch_then_corrupted_state() {
        let env = Env::new();
        env.init();
        let url = file_url(&env.temp.path().join("missing.txt"));

        env.cmd()
            .args(["get", &url])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to fetch"));

        env.cmd()
            .args(["get", &url])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Corrupted cache state"))
            .stderr(predicate::str::contains("urlcache clear"));

        env.cmd()
            .args(["status", &url])
            .assert()
            .success()
            .stdout(predicate::str::contains("abandoned"));
    }

    #[test]
    fn clear_recovers_from_corruption() {
        let env = Env::new();
        env.init();
        let path = env.temp.path().join("late.txt");
        let url = file_url(&path);

        env.cmd().args(["get", &url]).assert().failure();
        fs::write(&path, b"now it exists").unwrap();

        env.cmd()
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cleared"));
        assert!(env.cache_dir().is_dir());

        env.cmd()
            .args(["get", &url])
            .assert()
            .success()
            .stdout("now it exists");
    }

    #[test]
    fn list_formats() {
        let env = Env::new();
        env.init();

        env.cmd()
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout("[]\n");

        let url = env.source("a.txt", b"a");
        env.cmd().args(["get", &url]).assert().success();

        env.cmd()
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout(format!("{}\n", url));

        env.cmd()
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"published\""));
    }

    #[test]
    fn status_unallocated() {
        let env = Env::new();
        env.init();
        env.cmd()
            .args(["status", "http://x/never"])
            .assert()
            .success()
            .stdout(predicate::str::contains("unallocated"));
    }

    #[test]
    fn config_path() {
        let env = Env::new();
        env.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let env = Env::new();
        env.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[wait]"));
    }
}

mod multi_process {
    use std::fs;
    use std::process::{Command, Stdio};
    use tempfile::TempDir;

    const WORKERS: usize = 6;

    #[test]
    fn concurrent_processes_fetch_once() {
        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("cache");
        fs::create_dir(&cache_dir).unwrap();
        let source = temp.path().join("big.bin");
        let body: Vec<u8> = (0..4 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        fs::write(&source, &body).unwrap();
        let url = format!("file://{}", source.display());

        let children: Vec<_> = (0..WORKERS)
            .map(|_| {
                Command::new(env!("CARGO_BIN_EXE_urlcache"))
                    .env_remove("URLCACHE_DIR")
                    .arg("-v")
                    .arg("--config")
                    .arg(temp.path().join("config.toml"))
                    .arg("--dir")
                    .arg(&cache_dir)
                    .args(["get", &url])
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()
                    .unwrap()
            })
            .collect();

        let mut fetches = 0;
        for child in children {
            let output = child.wait_with_output().unwrap();
            let stderr = String::from_utf8_lossy(&output.stderr);
            assert!(output.status.success(), "worker failed: {}", stderr);
            assert!(output.stdout == body, "worker returned different bytes");
            fetches += stderr.matches("Fetching").count();
        }

        assert_eq!(fetches, 1);
        assert_eq!(
            fs::read_to_string(cache_dir.join("index")).unwrap(),
            format!("{}\n", url)
        );
        assert!(!cache_dir.join("0-fetching").exists());
    }
}
