//! Version download tests against a mock Maven repository.
//!
//! Cover release and snapshot resolution, checksum verification and the
//! registry state left behind by each outcome.

use std::io::{Cursor, Write};

use md5::{Digest, Md5};
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xtool::core::error::XToolError;
use xtool::core::registry::Registry;
use xtool::core::version::VersionManager;
use zip::write::SimpleFileOptions;

const RELEASE_DIR: &str =
    "/releases/org/xwiki/platform/xwiki-platform-distribution-flavor-jetty-hsqldb/15.10";
const RELEASE_ZIP: &str = "xwiki-platform-distribution-flavor-jetty-hsqldb-15.10.zip";

fn distribution_zip(top: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in [
        ("start_xwiki.sh", "#!/bin/sh\nexit 0\n"),
        ("webapps/xwiki/WEB-INF/xwiki.cfg", "xwiki.store=hibernate\n"),
        ("webapps/xwiki/WEB-INF/lib/core.jar", "jar bytes"),
    ] {
        writer.start_file(format!("{top}/{name}"), options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

struct Fixture {
    _dir: tempfile::TempDir,
    manager: VersionManager,
    registry: Registry,
}

fn fixture(server: &MockServer) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let versions = dir.path().join("versions");
    std::fs::create_dir_all(&versions).unwrap();

    let mut registry = Registry::load(&dir.path().join("config.json")).unwrap();
    registry
        .set_preference("repository-url", json!(server.uri()))
        .unwrap();

    Fixture {
        manager: VersionManager::new(versions, Client::new()),
        registry,
        _dir: dir,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Releases
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn release_download_extracts_and_registers() {
    let server = MockServer::start().await;
    let archive = distribution_zip("xwiki-platform-distribution-flavor-jetty-hsqldb-15.10");

    Mock::given(method("GET"))
        .and(path(format!("{RELEASE_DIR}/{RELEASE_ZIP}.md5")))
        .respond_with(ResponseTemplate::new(200).set_body_string(md5_hex(&archive)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{RELEASE_DIR}/{RELEASE_ZIP}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(1)
        .mount(&server)
        .await;

    let mut f = fixture(&server);
    f.manager.ensure_version(&mut f.registry, "15.10").await.unwrap();
    // Already present: no second archive request.
    f.manager.ensure_version(&mut f.registry, "15.10").await.unwrap();

    let directory = f.manager.directory_path("15.10");
    assert!(directory.join("webapps/xwiki/WEB-INF/xwiki.cfg").is_file());
    assert!(!f.manager.archive_path("15.10").exists());
    assert!(f.registry.has_version("15.10"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(directory.join("start_xwiki.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    let reloaded = Registry::load(f.registry.path()).unwrap();
    assert_eq!(reloaded.versions().to_vec(), vec!["15.10".to_string()]);
}

#[tokio::test]
async fn checksum_mismatch_leaves_nothing_behind() {
    let server = MockServer::start().await;
    let archive = distribution_zip("xwiki-platform-distribution-flavor-jetty-hsqldb-15.10");

    Mock::given(method("GET"))
        .and(path(format!("{RELEASE_DIR}/{RELEASE_ZIP}.md5")))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "{}  {RELEASE_ZIP}\n",
            md5_hex(b"something else")
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{RELEASE_DIR}/{RELEASE_ZIP}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .mount(&server)
        .await;

    let mut f = fixture(&server);
    let err = f.manager.download(&mut f.registry, "15.10").await.unwrap_err();

    assert!(matches!(err, XToolError::VersionUnavailable(ref v) if v == "15.10"));
    assert!(f.registry.versions().is_empty());
    assert!(!f.manager.archive_path("15.10").exists());
    assert!(!f.manager.directory_path("15.10").exists());
}

#[tokio::test]
async fn missing_checksum_means_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut f = fixture(&server);
    let err = f.manager.download(&mut f.registry, "15.10").await.unwrap_err();
    assert!(matches!(err, XToolError::VersionUnavailable(_)));
    assert!(f.registry.versions().is_empty());
}

// ────────────────────────────────────────────────────────────────────────────
// Snapshots
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_download_uses_latest_build() {
    let server = MockServer::start().await;
    let folder =
        "/snapshots/org/xwiki/platform/xwiki-platform-distribution-flavor-jetty-hsqldb/16.0.0-SNAPSHOT";
    let build = "xwiki-platform-distribution-flavor-jetty-hsqldb-16.0.0-20240105.101010-7.zip";
    let archive = distribution_zip("xwiki-platform-distribution-flavor-jetty-hsqldb-16.0.0-SNAPSHOT");

    Mock::given(method("GET"))
        .and(path(format!("{folder}/maven-metadata.xml")))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<metadata>
              <versioning>
                <snapshotVersions>
                  <snapshotVersion>
                    <extension>zip</extension>
                    <value>16.0.0-20240105.101010-7</value>
                    <updated>20240105101010</updated>
                  </snapshotVersion>
                </snapshotVersions>
              </versioning>
            </metadata>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{folder}/{build}.md5")))
        .respond_with(ResponseTemplate::new(200).set_body_string(md5_hex(&archive)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{folder}/{build}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(1)
        .mount(&server)
        .await;

    let mut f = fixture(&server);
    f.manager
        .download(&mut f.registry, "16.0.0-SNAPSHOT")
        .await
        .unwrap();

    assert!(f.registry.has_version("16.0.0-SNAPSHOT"));
    assert!(f
        .manager
        .directory_path("16.0.0-SNAPSHOT")
        .join("start_xwiki.sh")
        .is_file());
}

#[tokio::test]
async fn unreadable_snapshot_metadata_means_unavailable() {
    let folder =
        "/snapshots/org/xwiki/platform/xwiki-platform-distribution-flavor-jetty-hsqldb/16.0.0-SNAPSHOT";

    for metadata in [
        ResponseTemplate::new(404),
        ResponseTemplate::new(200).set_body_string("<metadata><versioning>"),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{folder}/maven-metadata.xml")))
            .respond_with(metadata)
            .expect(1)
            .mount(&server)
            .await;

        let mut f = fixture(&server);
        let err = f
            .manager
            .download(&mut f.registry, "16.0.0-SNAPSHOT")
            .await
            .unwrap_err();

        assert!(matches!(err, XToolError::VersionUnavailable(ref v) if v == "16.0.0-SNAPSHOT"));
        assert!(f.registry.versions().is_empty());
        assert!(!f.manager.directory_path("16.0.0-SNAPSHOT").exists());
        let versions_dir = f.manager.archive_path("16.0.0-SNAPSHOT");
        let leftovers = std::fs::read_dir(versions_dir.parent().unwrap())
            .unwrap()
            .count();
        assert_eq!(leftovers, 0, "no archive or .part file may remain");
    }
}

#[tokio::test]
async fn invalid_version_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut f = fixture(&server);
    let err = f
        .manager
        .download(&mut f.registry, "not a version")
        .await
        .unwrap_err();
    assert!(matches!(err, XToolError::InvalidVersion(_)));
}
