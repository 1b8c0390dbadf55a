use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration for category '{category}': {reason}")]
    Configuration { category: String, reason: String },

    #[error("Candidate retrieval failed in collector '{collector}': {reason}")]
    CandidateRetrieval { collector: String, reason: String },

    #[error("Failed to score candidate {candidate_id}: {reason}")]
    Scoring { candidate_id: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn configuration(category: impl Into<String>, reason: impl ToString) -> Self {
        Error::Configuration { category: category.into(), reason: reason.to_string() }
    }

    pub fn retrieval(collector: impl Into<String>, reason: impl ToString) -> Self {
        Error::CandidateRetrieval { collector: collector.into(), reason: reason.to_string() }
    }

    pub fn scoring(candidate_id: impl Into<String>, reason: impl ToString) -> Self {
        Error::Scoring { candidate_id: candidate_id.into(), reason: reason.to_string() }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
