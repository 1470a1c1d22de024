//! Integration tests for shellcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use mockito::{Mock, Server, ServerGuard};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn shellcache() -> Command {
        cargo_bin_cmd!("shellcache")
    }

    /// Command bound to a config file, ignoring any local config
    fn with_config(config: &Path) -> Command {
        let mut cmd = shellcache();
        cmd.env_remove("SHELLCACHE_CONFIG")
            .arg("--no-local")
            .arg("--config")
            .arg(config);
        cmd
    }

    const SHELL: &[&str] = &["index.html", "main.dart.js"];

    const BUILD: &[(&str, &str)] = &[
        ("index.html", "<html><script src=\"main.dart.js\"></script></html>"),
        ("main.dart.js", "void main() {}"),
        ("assets/logo.png", "PNG"),
        ("flutter_service_worker.js", "self.addEventListener()"),
    ];

    /// Paths the origin answers with 404
    const MISSING: &[&str] = &["/api/data", "/extra.js"];

    struct Project {
        dir: TempDir,
        server: ServerGuard,
        _mocks: Vec<Mock>,
    }

    impl Project {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            for (path, body) in BUILD {
                let file = dir.path().join("build").join(path);
                std::fs::create_dir_all(file.parent().unwrap()).unwrap();
                std::fs::write(file, body).unwrap();
            }

            let mut server = Server::new();
            let mut mocks: Vec<Mock> = BUILD
                .iter()
                .map(|(path, body)| {
                    server
                        .mock("GET", format!("/{}", path).as_str())
                        .with_status(200)
                        .with_header("content-type", "text/plain")
                        .with_body(body)
                        .create()
                })
                .collect();
            mocks.push(
                server
                    .mock("GET", "/")
                    .with_status(200)
                    .with_header("content-type", "text/html")
                    .with_body(BUILD[0].1)
                    .create(),
            );
            for path in MISSING {
                mocks.push(server.mock("GET", *path).with_status(404).create());
            }

            Self {
                dir,
                server,
                _mocks: mocks,
            }
        }

        fn origin(&self) -> String {
            self.server.url()
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn generate_manifest(&self) {
            shellcache()
                .arg("manifest")
                .arg(self.path("build"))
                .arg("-o")
                .arg(self.path("manifest.json"))
                .assert()
                .success();
        }

        fn write_config(&self, shell: &[&str]) -> PathBuf {
            let config = self.path("config.toml");
            let shell = shell
                .iter()
                .map(|key| format!("\"{}\"", key))
                .collect::<Vec<_>>()
                .join(", ");
            std::fs::write(
                &config,
                format!(
                    "[worker]\norigin = \"{}\"\nmanifest = \"manifest.json\"\nshell = [{}]\n\n[storage]\nroot = \"store\"\n",
                    self.origin(),
                    shell
                ),
            )
            .unwrap();
            config
        }

        /// Generate the manifest, install and activate
        fn deploy(&self, shell: &[&str]) -> PathBuf {
            self.generate_manifest();
            let config = self.write_config(shell);
            with_config(&config).arg("install").assert().success();
            with_config(&config).arg("activate").assert().success();
            config
        }
    }

    #[test]
    fn help_displays() {
        shellcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline asset cache"));
    }

    #[test]
    fn version_displays() {
        shellcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shellcache"));
    }

    #[test]
    fn config_path_honors_flag() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("custom.toml");
        with_config(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let temp = TempDir::new().unwrap();
        with_config(&temp.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[worker]"))
            .stdout(predicate::str::contains("flutter-app-cache"));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("nested").join("config.toml");
        with_config(&config).args(["config", "init"]).assert().success();
        assert!(std::fs::read_to_string(&config).unwrap().contains("[fetch]"));
    }

    #[test]
    fn install_without_manifest_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        with_config(&temp.path().join("missing.toml"))
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No resource manifest configured"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn manifest_to_stdout_skips_worker_script() {
        let project = Project::new();
        shellcache()
            .arg("manifest")
            .arg(project.path("build"))
            .assert()
            .success()
            .stdout(predicate::str::contains("\"main.dart.js\""))
            .stdout(predicate::str::contains("\"assets/logo.png\""))
            .stdout(predicate::str::contains("\"/\""))
            .stdout(predicate::str::contains("flutter_service_worker.js").not());
    }

    #[test]
    fn manifest_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        shellcache()
            .arg("manifest")
            .arg(temp.path().join("nope"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn full_lifecycle_against_local_origin() {
        let project = Project::new();
        project.generate_manifest();
        let config = project.write_config(SHELL);

        with_config(&config)
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("Installed worker"));

        with_config(&config)
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"state\": \"staged\""));

        with_config(&config)
            .arg("activate")
            .assert()
            .success()
            .stdout(predicate::str::contains("Activated worker"));

        let main_js = format!("{}/main.dart.js", project.origin());
        with_config(&config)
            .args(["fetch", &main_js])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("cache 200"));

        let api = format!("{}/api/data", project.origin());
        with_config(&config)
            .args(["fetch", &api])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("passthrough 404"));

        with_config(&config)
            .args(["message", "downloadOffline"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Downloaded 2 resource(s)"));

        with_config(&config)
            .args(["message", "downloadOffline"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already available offline"));

        with_config(&config)
            .args(["message", "hello"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Ignored"));

        with_config(&config)
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"state\": \"reconciled\""))
            .stdout(predicate::str::contains("\"missing\": 0"));

        let journal = std::fs::read_to_string(project.path("store").join("journal.log")).unwrap();
        assert!(journal.contains("worker.installed"));
        assert!(journal.contains("worker.activated"));
        assert!(journal.contains("prefetch.completed"));
    }

    #[test]
    fn activate_before_install_is_rejected() {
        let project = Project::new();
        project.generate_manifest();
        let config = project.write_config(SHELL);

        with_config(&config)
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("installing"));
    }

    #[test]
    fn failed_install_after_deploy_keeps_previous_version_serving() {
        let project = Project::new();
        let config = project.deploy(SHELL);
        let logo = format!("{}/assets/logo.png", project.origin());
        with_config(&config)
            .args(["fetch", &logo])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("network 200"));
        with_config(&config)
            .args(["fetch", &logo])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("cache 200"));

        // Next build adds a shell resource the origin cannot serve
        std::fs::write(project.path("build").join("extra.js"), "extra").unwrap();
        project.generate_manifest();
        let config = project.write_config(&["index.html", "main.dart.js", "extra.js"]);
        with_config(&config)
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("extra.js"))
            .stderr(predicate::str::contains("retrying may succeed"));

        with_config(&config)
            .args(["fetch", &logo])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("cache 200"));
        with_config(&config)
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"state\": \"installing\""))
            .stdout(predicate::str::contains("\"serving\": \""));
    }
}

/// Lifecycle properties exercised through the library API
mod lifecycle_tests {
    use shellcache::fetch::{Request, ScriptedFetcher};
    use shellcache::manifest::ResourceManifest;
    use shellcache::origin::Origin;
    use shellcache::store::{CacheStore, MemoryStorage, PartitionNames};
    use shellcache::worker::{
        Activation, FetchOutcome, ResponseSource, ServiceWorker, WorkerContext,
    };
    use std::sync::Arc;

    const ORIGIN: &str = "https://app.test";
    const HASH_1: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_2: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const OLD_HASH: &str = "cccccccccccccccccccccccccccccccc";

    fn url(key: &str) -> String {
        Origin::parse(ORIGIN).unwrap().resource_url(key)
    }

    struct Harness {
        storage: Arc<MemoryStorage>,
        fetcher: Arc<ScriptedFetcher>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                storage: Arc::new(MemoryStorage::new()),
                fetcher: Arc::new(ScriptedFetcher::new()),
            }
        }

        fn worker(&self, entries: &[(&str, &str)], shell: &[&str]) -> ServiceWorker {
            let manifest = ResourceManifest::from_entries(entries.iter().copied()).unwrap();
            let ctx = WorkerContext::new(
                Origin::parse(ORIGIN).unwrap(),
                manifest,
                shell.iter().copied(),
                self.storage.clone(),
                self.fetcher.clone(),
            )
            .unwrap();
            ServiceWorker::new(ctx)
        }

        /// Install and activate a worker, expecting success
        async fn deploy(&self, entries: &[(&str, &str)], shell: &[&str]) -> ServiceWorker {
            let worker = self.worker(entries, shell);
            worker.install().await.unwrap();
            assert!(worker.activate().await.unwrap().is_reconciled());
            worker
        }

        fn content(&self) -> Arc<shellcache::store::MemoryStore> {
            self.storage.partition(&PartitionNames::default().content)
        }
    }

    #[tokio::test]
    async fn unchanged_resource_survives_and_changed_one_is_evicted() {
        let h = Harness::new();
        h.fetcher.respond(&url("a.js"), "a-v1").respond(&url("b.js"), "b-v1");

        // Previous deployment with b.js at an old fingerprint, both cached
        let old = h.deploy(&[("a.js", HASH_1), ("b.js", OLD_HASH)], &["a.js"]).await;
        old.handle_fetch(&Request::get(url("b.js"))).await.unwrap();
        old.settle().await;
        assert_eq!(h.content().len(), 2);

        h.fetcher.reset_calls();
        let new = h.worker(&[("a.js", HASH_1), ("b.js", HASH_2)], &["a.js"]);
        new.install().await.unwrap();
        let summary = match new.activate().await.unwrap() {
            Activation::Reconciled(summary) => summary,
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(summary.retained, vec!["a.js"]);
        assert_eq!(summary.evicted, vec![url("b.js")]);
        assert_eq!(h.content().keys().await.unwrap(), vec![url("a.js")]);
        // b.js is not restocked until requested
        assert_eq!(h.fetcher.calls_to(&url("b.js")), 0);
    }

    #[tokio::test]
    async fn retention_follows_fingerprint_equality() {
        // Every combination of (old fingerprint, new fingerprint) per key
        let cases: &[(&str, Option<&str>, Option<&str>, bool)] = &[
            ("same.js", Some(HASH_1), Some(HASH_1), true),
            ("changed.js", Some(HASH_1), Some(HASH_2), false),
            ("dropped.js", Some(HASH_1), None, false),
            ("added.js", None, Some(HASH_1), false),
        ];

        let h = Harness::new();
        let old: Vec<(&str, &str)> = cases.iter().filter_map(|c| c.1.map(|fp| (c.0, fp))).collect();
        h.deploy(&old, &[]).await;

        let content = h.content();
        for (key, ..) in cases {
            content
                .put(&url(key), shellcache::fetch::Response::ok(url(key), *key))
                .await
                .unwrap();
        }

        let new: Vec<(&str, &str)> = cases.iter().filter_map(|c| c.2.map(|fp| (c.0, fp))).collect();
        h.deploy(&new, &[]).await;

        let kept = h.content().keys().await.unwrap();
        for (key, _, _, retained) in cases {
            assert_eq!(kept.contains(&url(key)), *retained, "retention of {}", key);
        }
    }

    #[tokio::test]
    async fn snapshot_matches_activated_manifest() {
        let h = Harness::new();
        let entries = [("a.js", HASH_1), ("/", HASH_2)];
        let worker = h.deploy(&entries, &[]).await;

        let snapshot = worker.previous_manifest().await.unwrap().unwrap();
        assert_eq!(snapshot, ResourceManifest::from_entries(entries).unwrap());
    }

    #[tokio::test]
    async fn first_install_leaves_exactly_the_shell() {
        let h = Harness::new();
        let content = h.content();
        for stray in ["old.js", "a.js"] {
            content
                .put(&url(stray), shellcache::fetch::Response::ok(url(stray), "stale"))
                .await
                .unwrap();
        }
        h.fetcher.respond(&url("index.html"), "<html>");

        h.deploy(&[("index.html", HASH_1), ("a.js", HASH_1)], &["index.html"])
            .await;
        assert_eq!(h.content().keys().await.unwrap(), vec![url("index.html")]);
    }

    #[tokio::test]
    async fn root_document_falls_back_to_cache_when_offline() {
        let h = Harness::new();
        h.fetcher.respond(&url("/"), "<html>v1</html>");
        let worker = h.deploy(&[("/", HASH_1)], &[]).await;

        worker.handle_fetch(&Request::get(url("/"))).await.unwrap();
        worker.settle().await;

        h.fetcher.fail(&url("/"), "offline");
        match worker.handle_fetch(&Request::get(url("/"))).await.unwrap() {
            FetchOutcome::Responded { response, source } => {
                assert_eq!(source, ResponseSource::Fallback);
                assert_eq!(response.body, b"<html>v1</html>");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn unlisted_key_is_not_intercepted() {
        let h = Harness::new();
        let worker = h.deploy(&[("a.js", HASH_1)], &[]).await;
        h.fetcher.reset_calls();

        let outcome = worker
            .handle_fetch(&Request::get(url("api/session")))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough));
        assert_eq!(h.fetcher.call_count(), 0);
        assert!(h.content().is_empty());
    }

    #[tokio::test]
    async fn second_offline_download_fetches_nothing() {
        let h = Harness::new();
        h.fetcher.respond(&url("a.js"), "a").respond(&url("b.js"), "b");
        let worker = h.deploy(&[("a.js", HASH_1), ("b.js", HASH_2)], &[]).await;

        let first = worker.download_offline().await.unwrap();
        assert_eq!(first.stored, vec!["a.js", "b.js"]);

        h.fetcher.reset_calls();
        let second = worker.download_offline().await.unwrap();
        assert!(second.stored.is_empty());
        assert_eq!(h.fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_install_keeps_previous_worker_serving() {
        let h = Harness::new();
        h.fetcher.respond(&url("a.js"), "a-v1");
        let old = h.deploy(&[("a.js", HASH_1)], &["a.js"]).await;

        h.fetcher.fail(&url("a.js"), "offline");
        let new = h.worker(&[("a.js", HASH_2)], &["a.js"]);
        assert!(new.install().await.is_err());

        match old.handle_fetch(&Request::get(url("a.js"))).await.unwrap() {
            FetchOutcome::Responded { response, source } => {
                assert_eq!(source, ResponseSource::Cache);
                assert_eq!(response.body, b"a-v1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
