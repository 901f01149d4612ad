use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Done,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub explanation: Option<Value>,
}

#[derive(Debug, Clone)]
pub enum JobLookup {
    NotFound,
    Pending {
        file_name: String,
    },
    Done {
        file_name: String,
        submitted_at: DateTime<Utc>,
        explanation: Value,
    },
}

impl JobLookup {
    pub fn to_response(&self) -> StatusResponse {
        match self {
            Self::NotFound => StatusResponse {
                status: JobStatus::NotFound,
                filename: None,
                timestamp: None,
                explanation: None,
            },
            Self::Pending { file_name } => StatusResponse {
                status: JobStatus::Pending,
                filename: Some(file_name.clone()),
                timestamp: Some(Utc::now()),
                explanation: None,
            },
            Self::Done {
                file_name,
                submitted_at,
                explanation,
            } => StatusResponse {
                status: JobStatus::Done,
                filename: Some(file_name.clone()),
                timestamp: Some(*submitted_at),
                explanation: Some(explanation.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::NotFound).expect("serialize"),
            "\"not_found\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Pending).expect("serialize"),
            "\"pending\""
        );
    }

    #[test]
    fn not_found_response_has_null_explanation_only() {
        let body = serde_json::to_value(JobLookup::NotFound.to_response()).expect("serialize");
        assert_eq!(body["status"], "not_found");
        assert!(body["explanation"].is_null());
        assert!(body.get("filename").is_none());
        assert!(body.get("timestamp").is_none());
    }
}
