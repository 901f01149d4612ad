use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Result;
use serde_json::{Map, Value};
use tokio::{fs, sync::Semaphore, task::JoinSet, time};
use tracing::{error, info, warn};

use crate::{
    artifact_store::ArtifactName, error::JobError, explain::ExplainerClient, extract, AppState,
};

pub fn spawn_scan_worker(state: AppState, explainer: ExplainerClient) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(state.config.scan_interval_seconds));
        loop {
            interval.tick().await;
            if let Err(err) = scan_incoming(&state, &explainer).await {
                warn!("Incoming scan failed: {err:#}");
            }
        }
    });
}

async fn scan_incoming(state: &AppState, explainer: &ExplainerClient) -> Result<()> {
    let pending = state.store.list_incoming().await?;
    if !pending.is_empty() {
        info!(count = pending.len(), "Scan found pending deck artifacts");
    }

    for raw_path in pending {
        if let Err(err) = process_deck_job(state, explainer, &raw_path).await {
            error!(
                artifact = %raw_path.display(),
                "Deck job failed, artifact left in incoming for retry: {err}"
            );
        }
    }
    Ok(())
}

pub async fn process_deck_job(
    state: &AppState,
    explainer: &ExplainerClient,
    raw_path: &Path,
) -> Result<(), JobError> {
    let file_name = raw_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let Some(name) = ArtifactName::parse_raw(file_name) else {
        return Err(JobError::MalformedName(file_name.to_string()));
    };

    info!(uid = %name.uid, artifact = %file_name, "Worker picked up deck job");

    let payload = fs::read(raw_path).await?;
    let slides = extract::extract_slide_texts(&payload)?;
    info!(uid = %name.uid, slides = slides.len(), "Extracted slide text");

    let explanations =
        generate_explanations(explainer, slides, state.config.explain_concurrency).await?;

    let document = assemble_result_document(&explanations);
    let rendered = serde_json::to_string_pretty(&document)?;
    let result_path = state.store.write_result(&name, &rendered).await?;
    info!(uid = %name.uid, result = %result_path.display(), "Result artifact written");

    let archived = state.store.archive_raw(raw_path).await?;
    info!(uid = %name.uid, archived = %archived.display(), "Deck job completed");
    Ok(())
}

async fn generate_explanations(
    explainer: &ExplainerClient,
    slides: Vec<String>,
    concurrency: usize,
) -> Result<Vec<String>, JobError> {
    let slide_count = slides.len();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut requests = JoinSet::new();

    for (index, slide_text) in slides.into_iter().enumerate() {
        let explainer = explainer.clone();
        let semaphore = Arc::clone(&semaphore);
        requests.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let explanation = match explainer.explain_slide(&slide_text).await {
                Ok(text) => text,
                Err(err) => {
                    warn!(
                        slide = index + 1,
                        "Explanation call failed, substituting fallback text: {err:#}"
                    );
                    format!("Something went wrong explaining this slide: {err}")
                }
            };
            (index, explanation)
        });
    }

    let mut ordered = vec![String::new(); slide_count];
    while let Some(joined) = requests.join_next().await {
        let (index, explanation) = joined.map_err(|err| JobError::Generation(err.to_string()))?;
        ordered[index] = explanation;
    }
    Ok(ordered)
}

fn assemble_result_document(explanations: &[String]) -> Value {
    let mut document = Map::with_capacity(explanations.len());
    for (index, explanation) in explanations.iter().enumerate() {
        document.insert(
            format!("slide{}", index + 1),
            Value::String(explanation.clone()),
        );
    }
    Value::Object(document)
}
