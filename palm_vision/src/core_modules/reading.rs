// THEORY:
// The analysis itself happens elsewhere: one HTTP call to a vision model. This module
// only pins down both sides of that call so the rest of the crate can be typed:
// - `AnalysisRequest` is what we send: the captured image, an optional birth year
//   and the reading language.
// - `ReadingResult` is what comes back: a character archetype, keywords, a summary,
//   the palm lines and a line of advice.
// - `AnalysisClient` is the seam a host plugs its HTTP client into.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::core_modules::encode::EncodedImage;
use crate::core_modules::palm_line::{PalmLine, ValidatedLines, partition_lines};
use crate::error::AnalysisError;

/// The archetype the reading assigns to the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub name: String,
    pub title: String,
    pub emoji: String,
    pub desc: String,
}

/// A full reading returned by the analysis collaborator. Immutable once received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingResult {
    pub character: Character,
    pub keywords: Vec<String>,
    pub summary: String,
    /// Lines in the order they should be drawn.
    pub lines: Vec<PalmLine>,
    pub advice: String,
}

#[derive(Deserialize)]
struct ServiceError {
    error: String,
}

impl ReadingResult {
    /// Parses a response body. An `{"error": "..."}` body becomes `AnalysisError::Service`.
    pub fn from_json(body: &str) -> Result<Self, AnalysisError> {
        if let Ok(ServiceError { error }) = serde_json::from_str::<ServiceError>(body) {
            return Err(AnalysisError::Service(error));
        }
        Ok(serde_json::from_str(body)?)
    }

    /// The drawable lines, with malformed ones split out.
    pub fn validated_lines(&self) -> ValidatedLines {
        partition_lines(&self.lines)
    }
}

/// One analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub image: EncodedImage,
    pub birth_year: Option<u16>,
    /// Language code of the reading, e.g. `ko` or `en`.
    pub language: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBody<'a> {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    birth_year: Option<u16>,
    language: &'a str,
}

impl AnalysisRequest {
    pub fn new(image: EncodedImage, language: impl Into<String>) -> Self {
        Self {
            image,
            birth_year: None,
            language: language.into(),
        }
    }

    pub fn with_birth_year(mut self, year: u16) -> Self {
        self.birth_year = Some(year);
        self
    }

    /// JSON request body with the image as a data URL.
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        let body = RequestBody {
            image: self.image.to_data_url(),
            birth_year: self.birth_year,
            language: &self.language,
        };
        Ok(serde_json::to_string(&body)?)
    }
}

/// The external analysis collaborator.
pub trait AnalysisClient: Send + Sync {
    fn analyze(&self, request: AnalysisRequest) -> BoxFuture<'_, Result<ReadingResult, AnalysisError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::device::Frame;
    use crate::core_modules::encode::encode_frame;

    const RESPONSE: &str = r##"{
        "character": {"name": "Wise Owl", "title": "지혜로운 올빼미", "emoji": "🦉", "desc": "thinker"},
        "keywords": ["#calm", "#curious", "#steady"],
        "summary": "A thoughtful palm.",
        "lines": [
            {"name": "lifeLine", "koreanName": "생명선", "score": 85, "color": "#FF6B6B",
             "coordinates": [[0.3, 0.4], [0.35, 0.5], [0.4, 0.6]], "meaning": "vitality"},
            {"name": "headLine", "koreanName": "지능선", "score": 88, "color": "#4ECDC4",
             "coordinates": [[0.25, 0.45], [0.4, 0.5]], "meaning": "analysis"}
        ],
        "advice": "Keep going."
    }"##;

    #[test]
    fn parses_full_reading() {
        let reading = ReadingResult::from_json(RESPONSE).unwrap();
        assert_eq!(reading.character.name, "Wise Owl");
        assert_eq!(reading.keywords.len(), 3);
        let ids: Vec<_> = reading.lines.iter().map(|l| l.identifier.as_str()).collect();
        assert_eq!(ids, vec!["lifeLine", "headLine"]);
        assert!(reading.validated_lines().rejected.is_empty());
    }

    #[test]
    fn error_body_is_service_error() {
        let err = ReadingResult::from_json(r#"{"error": "No image data provided"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::Service(msg) if msg == "No image data provided"));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = ReadingResult::from_json("not json").unwrap_err();
        assert!(matches!(err, AnalysisError::Malformed(_)));
    }

    #[test]
    fn request_body_uses_camel_case_and_data_url() {
        let image = encode_frame(&Frame::solid(4, 4, [9, 9, 9, 255]), 90).unwrap();
        let body = AnalysisRequest::new(image.clone(), "ko").with_birth_year(1994).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["birthYear"], 1994);
        assert_eq!(value["language"], "ko");
        assert!(value["image"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));

        let without_year = AnalysisRequest::new(image, "en").to_json().unwrap();
        assert!(!without_year.contains("birthYear"));
    }
}
