//! Pull-request build lookup.
//!
//! Pull-request builds are not published as releases. The binary lives in a
//! zipped GitHub Actions artefact attached to the `build / Build` check run
//! of the pull request's head commit. Every API call and the archive
//! download carry the operator's token as a bearer credential.
//!
//! These artefacts have no hash manifest. Callers must install them through
//! [`VerificationPolicy::Unverified`](crate::artefact::verification::VerificationPolicy::Unverified).

use crate::artefact::error::ArtefactError;
use crate::error::{InstallerError, Result};
use crate::transport::Transport;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::Path;

/// Name of the check run whose workflow produces the binary.
pub const BUILD_CHECK_RUN: &str = "build / Build";

/// Name of the workflow artefact holding the binary.
pub const BUILD_ARTIFACT: &str = "k3s";

/// Path segment index of the workflow run id within a check run's
/// `details_url` (`https://github.com/{owner}/{repo}/actions/runs/{id}/...`).
const RUN_ID_SEGMENT: usize = 7;

/// A resolved pull-request build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestArtifact {
    /// Head commit of the pull request.
    pub commit: String,
    /// URL of the zipped build artefact.
    pub archive_url: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    head: Head,
}

#[derive(Debug, Deserialize)]
struct Head {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CheckRuns {
    check_runs: Vec<CheckRun>,
}

#[derive(Debug, Deserialize)]
struct CheckRun {
    name: String,
    details_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Artifacts {
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    name: String,
    archive_download_url: String,
}

/// Find the build artefact for pull request `number`.
///
/// # Errors
///
/// Returns [`InstallerError::UnresolvedRelease`] if any API response is
/// malformed or lacks the expected check run or artefact.
pub fn resolve_pull_request(
    transport: &dyn Transport,
    api_url: &str,
    number: u64,
    token: &str,
) -> Result<PullRequestArtifact> {
    let api_url = api_url.trim_end_matches('/');

    let pull: PullRequest = fetch_json(transport, &format!("{api_url}/pulls/{number}"), token)?;
    let commit = pull.head.sha;

    let runs: CheckRuns = fetch_json(
        transport,
        &format!("{api_url}/commits/{commit}/check-runs"),
        token,
    )?;
    let run_id = build_run_id(&runs).ok_or_else(|| InstallerError::UnresolvedRelease {
        reason: format!("no {BUILD_CHECK_RUN:?} check run found for commit {commit}"),
    })?;

    let artifacts: Artifacts = fetch_json(
        transport,
        &format!("{api_url}/actions/runs/{run_id}/artifacts"),
        token,
    )?;
    let archive_url = artifacts
        .artifacts
        .into_iter()
        .find(|artifact| artifact.name == BUILD_ARTIFACT)
        .map(|artifact| artifact.archive_download_url)
        .ok_or_else(|| InstallerError::UnresolvedRelease {
            reason: format!("workflow run {run_id} has no {BUILD_ARTIFACT:?} artefact"),
        })?;

    Ok(PullRequestArtifact {
        commit,
        archive_url,
    })
}

fn fetch_json<T: DeserializeOwned>(transport: &dyn Transport, url: &str, token: &str) -> Result<T> {
    let body = transport.fetch_text(url, Some(token))?;
    serde_json::from_str(&body).map_err(|e| InstallerError::UnresolvedRelease {
        reason: format!("unexpected response from {url}: {e}"),
    })
}

fn build_run_id(runs: &CheckRuns) -> Option<String> {
    runs.check_runs
        .iter()
        .filter(|run| run.name == BUILD_CHECK_RUN)
        .find_map(|run| run.details_url.as_deref()?.split('/').nth(RUN_ID_SEGMENT))
        .map(str::to_owned)
}

/// Copy the entry named `filename` out of the zip archive at `archive`.
///
/// # Errors
///
/// Returns [`ArtefactError::InvalidArchive`] if the archive cannot be read
/// or has no such entry, or an I/O error if `dest` cannot be written.
pub fn extract_binary(archive: &Path, filename: &str, dest: &Path) -> Result<()> {
    let invalid = |reason: String| InstallerError::from(ArtefactError::InvalidArchive { reason });

    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| invalid(e.to_string()))?;
    let mut entry = zip
        .by_name(filename)
        .map_err(|e| invalid(format!("{filename}: {e}")))?;
    let mut out = fs::File::create(dest)?;
    io::copy(&mut entry, &mut out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticTransport;
    use std::io::Write;

    const API: &str = "https://api.github.com/repos/k3s-io/k3s";
    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    fn transport_with_build(check_run_name: &str) -> StaticTransport {
        StaticTransport::default()
            .with_body(
                &format!("{API}/pulls/99"),
                format!(r#"{{"number":99,"head":{{"sha":"{SHA}","ref":"fix"}}}}"#),
            )
            .with_body(
                &format!("{API}/commits/{SHA}/check-runs"),
                format!(
                    r#"{{"total_count":2,"check_runs":[
                        {{"name":"lint","details_url":null}},
                        {{"name":"{check_run_name}","details_url":"https://github.com/k3s-io/k3s/actions/runs/555/job/1"}}
                    ]}}"#
                ),
            )
            .with_body(
                &format!("{API}/actions/runs/555/artifacts"),
                r#"{"artifacts":[
                    {"name":"k3s-arm64","archive_download_url":"https://api.github.com/a/1/zip"},
                    {"name":"k3s","archive_download_url":"https://api.github.com/a/2/zip"}
                ]}"#,
            )
    }

    #[test]
    fn resolves_archive_for_head_commit() {
        let transport = transport_with_build(BUILD_CHECK_RUN);
        let artifact = resolve_pull_request(&transport, API, 99, "token").expect("resolves");
        assert_eq!(artifact.commit, SHA);
        assert_eq!(artifact.archive_url, "https://api.github.com/a/2/zip");
        assert_eq!(transport.tokens_seen(), vec!["token".to_owned(); 3]);
    }

    #[test]
    fn missing_build_check_run_is_unresolved() {
        let transport = transport_with_build("build / Test");
        let err = resolve_pull_request(&transport, API, 99, "token").expect_err("no build run");
        assert!(matches!(err, InstallerError::UnresolvedRelease { .. }));
    }

    #[test]
    fn malformed_json_is_unresolved() {
        let transport = StaticTransport::default().with_body(&format!("{API}/pulls/1"), "<html>");
        let err = resolve_pull_request(&transport, API, 1, "token").expect_err("bad json");
        assert!(err.to_string().contains("unexpected response"));
    }

    #[test]
    fn extracts_named_entry_from_zip() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("k3s.zip");
        {
            let mut writer =
                zip::ZipWriter::new(fs::File::create(&archive).expect("create archive"));
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("k3s.sha256sum", options).expect("start");
            writer.write_all(b"ignored").expect("write");
            writer.start_file("k3s", options).expect("start");
            writer.write_all(b"pr binary").expect("write");
            writer.finish().expect("finish archive");
        }

        let dest = temp.path().join("k3s.bin");
        extract_binary(&archive, "k3s", &dest).expect("extracts");
        assert_eq!(fs::read(&dest).expect("read"), b"pr binary");
    }

    #[test]
    fn missing_zip_entry_is_invalid_archive() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("k3s.zip");
        zip::ZipWriter::new(fs::File::create(&archive).expect("create archive"))
            .finish()
            .expect("finish archive");

        let err = extract_binary(&archive, "k3s", &temp.path().join("out"))
            .expect_err("entry missing");
        assert!(matches!(
            err,
            InstallerError::Artefact(ArtefactError::InvalidArchive { .. })
        ));
    }
}
