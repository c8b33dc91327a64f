use questline_core::{
    QuestSuggester, SuggestionBatch, SuggestionConfig, SuggestionParseError, SuggestionRequest,
    parse_suggestions, suggestion_plan,
};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("failed to read suggestion response {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("suggestion response {path} has no usable quests")]
    Parse {
        path: PathBuf,
        #[source]
        source: SuggestionParseError,
    },
}

/// Replays a text-generation reply saved to disk.
#[derive(Debug, Clone)]
pub struct ResponseFileSuggester {
    path: PathBuf,
    config: SuggestionConfig,
}

impl ResponseFileSuggester {
    pub const fn new(path: PathBuf, config: SuggestionConfig) -> Self {
        Self { path, config }
    }
}

impl QuestSuggester for ResponseFileSuggester {
    type Error = ResponseError;

    fn suggest(&self, request: &SuggestionRequest) -> Result<SuggestionBatch, Self::Error> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| ResponseError::Io {
            path: self.path.clone(),
            source,
        })?;
        let quests = parse_suggestions(&raw, &request.goal, &self.config).map_err(|source| {
            ResponseError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        Ok(SuggestionBatch {
            quests,
            advice: suggestion_plan(request, &self.config).advice,
        })
    }
}
