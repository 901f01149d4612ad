use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::{config::Config, models::JobLookup};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
pub const RESULT_SUFFIX: &str = "_explanations.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub stem: String,
    pub submitted_at: DateTime<Utc>,
    pub uid: String,
    pub extension: String,
}

impl ArtifactName {
    pub fn for_upload(original_name: &str, submitted_at: DateTime<Utc>, uid: Uuid) -> Self {
        let safe = sanitize_file_name(original_name);
        let path = Path::new(&safe);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("upload")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        Self {
            stem,
            submitted_at: truncate_to_seconds(submitted_at),
            uid: uid.to_string(),
            extension,
        }
    }

    pub fn raw_file_name(&self) -> String {
        format!(
            "{}_{}_{}{}",
            self.stem,
            self.submitted_at.format(TIMESTAMP_FORMAT),
            self.uid,
            self.extension
        )
    }

    pub fn result_file_name(&self) -> String {
        format!(
            "{}_{}_{}{}",
            self.stem,
            self.submitted_at.format(TIMESTAMP_FORMAT),
            self.uid,
            RESULT_SUFFIX
        )
    }

    pub fn parse_raw(file_name: &str) -> Option<Self> {
        let path = Path::new(file_name);
        let stem_part = path.file_stem()?.to_str()?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let (stem, submitted_at, uid) = split_name_fields(stem_part)?;
        Some(Self {
            stem,
            submitted_at,
            uid,
            extension,
        })
    }

    pub fn parse_result(file_name: &str) -> Option<Self> {
        let stem_part = file_name.strip_suffix(RESULT_SUFFIX)?;
        let (stem, submitted_at, uid) = split_name_fields(stem_part)?;
        Some(Self {
            stem,
            submitted_at,
            uid,
            extension: String::new(),
        })
    }
}

fn split_name_fields(stem_part: &str) -> Option<(String, DateTime<Utc>, String)> {
    let mut fields = stem_part.rsplitn(3, '_');
    let uid = fields.next()?;
    let timestamp = fields.next()?;
    let stem = fields.next()?;
    if stem.is_empty() {
        return None;
    }

    Uuid::parse_str(uid).ok()?;
    let submitted_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();

    Some((stem.to_string(), submitted_at, uid.to_string()))
}

pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    let rendered = ts.format(TIMESTAMP_FORMAT).to_string();
    NaiveDateTime::parse_from_str(&rendered, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .unwrap_or(ts)
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    incoming: PathBuf,
    archive: PathBuf,
    output: PathBuf,
}

impl ArtifactStore {
    pub fn new(config: &Config) -> Self {
        Self::at(
            config.incoming_dir.clone(),
            config.archive_dir.clone(),
            config.output_dir.clone(),
        )
    }

    pub fn at(incoming: PathBuf, archive: PathBuf, output: PathBuf) -> Self {
        Self {
            incoming,
            archive,
            output,
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.incoming, &self.archive, &self.output] {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create artifact directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub async fn store_upload(&self, name: &ArtifactName, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.incoming.join(name.raw_file_name());
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn list_incoming(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(&self.incoming).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    pub async fn write_result(&self, name: &ArtifactName, payload: &str) -> std::io::Result<PathBuf> {
        let final_path = self.output.join(name.result_file_name());
        let staging_path = self.output.join(format!(
            ".{}_{}.part",
            name.stem,
            name.submitted_at.format(TIMESTAMP_FORMAT)
        ));
        fs::write(&staging_path, payload).await?;
        fs::rename(&staging_path, &final_path).await?;
        Ok(final_path)
    }

    pub async fn archive_raw(&self, raw_path: &Path) -> std::io::Result<PathBuf> {
        let file_name = raw_path
            .file_name()
            .ok_or_else(|| std::io::Error::other("raw artifact path has no file name"))?;
        let dest = self.archive.join(file_name);
        fs::rename(raw_path, &dest).await?;
        Ok(dest)
    }

    pub async fn lookup(&self, uid: &str) -> Result<JobLookup> {
        let in_incoming = find_match(&self.incoming, uid).await?;
        let in_archive = find_match(&self.archive, uid).await?;
        if in_incoming.is_none() && in_archive.is_none() {
            return Ok(JobLookup::NotFound);
        }

        if let Some(result_name) = find_match(&self.output, uid).await? {
            let path = self.output.join(&result_name);
            let raw = fs::read(&path)
                .await
                .with_context(|| format!("Failed to read result artifact {}", path.display()))?;
            let explanation: Value = serde_json::from_slice(&raw)
                .with_context(|| format!("Result artifact {} is not valid JSON", path.display()))?;
            let submitted_at = match ArtifactName::parse_result(&result_name) {
                Some(parsed) => parsed.submitted_at,
                None => {
                    warn!(
                        result = %result_name,
                        "Result artifact name does not carry a parseable timestamp"
                    );
                    Utc::now()
                }
            };
            return Ok(JobLookup::Done {
                file_name: result_name,
                submitted_at,
                explanation,
            });
        }

        match in_incoming.or(in_archive) {
            Some(file_name) => Ok(JobLookup::Pending { file_name }),
            None => Ok(JobLookup::NotFound),
        }
    }
}

async fn find_match(dir: &Path, uid: &str) -> Result<Option<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to list artifact directory {}", dir.display()))
        }
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to read entry in {}", dir.display()))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.contains(uid) && entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            return Ok(Some(name.to_string()));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_time() -> DateTime<Utc> {
        NaiveDateTime::parse_from_str("20240311153000", TIMESTAMP_FORMAT)
            .expect("timestamp")
            .and_utc()
    }

    fn store_in(dir: &Path) -> ArtifactStore {
        ArtifactStore::at(
            dir.join("incoming"),
            dir.join("archive"),
            dir.join("explanations"),
        )
    }

    #[test]
    fn raw_name_round_trips_through_parse() {
        let uid = Uuid::new_v4();
        let name = ArtifactName::for_upload("Quarterly Report_v2.pptx", sample_time(), uid);

        let rendered = name.raw_file_name();
        assert_eq!(
            rendered,
            format!("Quarterly_Report_v2_20240311153000_{uid}.pptx")
        );

        let parsed = ArtifactName::parse_raw(&rendered).expect("parse raw");
        assert_eq!(parsed, name);
    }

    #[test]
    fn result_name_reuses_raw_fields() {
        let uid = Uuid::new_v4();
        let name = ArtifactName::for_upload("lecture.pptx", sample_time(), uid);

        let rendered = name.result_file_name();
        assert_eq!(
            rendered,
            format!("lecture_20240311153000_{uid}_explanations.json")
        );

        let parsed = ArtifactName::parse_result(&rendered).expect("parse result");
        assert_eq!(parsed.stem, "lecture");
        assert_eq!(parsed.uid, uid.to_string());
        assert_eq!(parsed.submitted_at, sample_time());
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert!(ArtifactName::parse_raw("notes.txt").is_none());
        assert!(ArtifactName::parse_raw("deck_20240311153000_not-a-uuid.pptx").is_none());
        assert!(ArtifactName::parse_raw(&format!(
            "deck_2024_{}.pptx",
            Uuid::new_v4()
        ))
        .is_none());
    }

    #[test]
    fn sanitize_strips_paths_and_odd_bytes() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("weird name!.pptx"), "weird_name_.pptx");
        assert_eq!(sanitize_file_name("C:\\decks\\intro.pptx"), "intro.pptx");
    }

    #[tokio::test]
    async fn unknown_uid_resolves_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        store.ensure_dirs().await.expect("dirs");

        let lookup = store.lookup(&Uuid::new_v4().to_string()).await.expect("lookup");
        assert!(matches!(lookup, JobLookup::NotFound));
    }

    #[tokio::test]
    async fn raw_artifact_alone_resolves_pending_from_either_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        store.ensure_dirs().await.expect("dirs");

        let uid = Uuid::new_v4();
        let name = ArtifactName::for_upload("deck.pptx", sample_time(), uid);
        let raw_path = store.store_upload(&name, b"bytes").await.expect("upload");

        let lookup = store.lookup(&uid.to_string()).await.expect("lookup");
        assert!(matches!(lookup, JobLookup::Pending { .. }));

        store.archive_raw(&raw_path).await.expect("archive");
        assert!(store.list_incoming().await.expect("list").is_empty());

        let lookup = store.lookup(&uid.to_string()).await.expect("lookup");
        match lookup {
            JobLookup::Pending { file_name } => assert_eq!(file_name, name.raw_file_name()),
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn result_artifact_resolves_done_with_embedded_timestamp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        store.ensure_dirs().await.expect("dirs");

        let uid = Uuid::new_v4();
        let name = ArtifactName::for_upload("deck.pptx", sample_time(), uid);
        let raw_path = store.store_upload(&name, b"bytes").await.expect("upload");

        let payload = json!({ "slide1": "first", "slide2": "second" });
        store
            .write_result(&name, &payload.to_string())
            .await
            .expect("result");
        store.archive_raw(&raw_path).await.expect("archive");

        let lookup = store.lookup(&uid.to_string()).await.expect("lookup");
        match lookup {
            JobLookup::Done {
                file_name,
                submitted_at,
                explanation,
            } => {
                assert_eq!(file_name, name.result_file_name());
                assert_eq!(submitted_at, sample_time());
                assert_eq!(explanation, payload);
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn result_without_raw_artifact_resolves_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        store.ensure_dirs().await.expect("dirs");

        let uid = Uuid::new_v4();
        let name = ArtifactName::for_upload("deck.pptx", sample_time(), uid);
        store
            .write_result(&name, &json!({ "slide1": "only" }).to_string())
            .await
            .expect("result");

        let lookup = store.lookup(&uid.to_string()).await.expect("lookup");
        assert!(matches!(lookup, JobLookup::NotFound));
    }

    #[tokio::test]
    async fn result_write_is_an_idempotent_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        store.ensure_dirs().await.expect("dirs");

        let uid = Uuid::new_v4();
        let name = ArtifactName::for_upload("deck.pptx", sample_time(), uid);
        store
            .write_result(&name, &json!({ "slide1": "draft" }).to_string())
            .await
            .expect("first write");
        store
            .write_result(&name, &json!({ "slide1": "final" }).to_string())
            .await
            .expect("second write");

        let mut results = std::fs::read_dir(dir.path().join("explanations"))
            .expect("read output dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        results.sort();
        assert_eq!(results, vec![name.result_file_name()]);

        let content =
            std::fs::read_to_string(dir.path().join("explanations").join(name.result_file_name()))
                .expect("read result");
        assert_eq!(content, json!({ "slide1": "final" }).to_string());
    }
}
