use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Retrieval strategy understood by every index backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Weighted fusion of lexical and semantic ranking.
    #[default]
    Hybrid,
    /// Lexical BM25 ranking.
    Bm25,
    /// Semantic nearest-neighbour ranking.
    Vector,
}

impl SearchMode {
    pub const ALL: [Self; 3] = [Self::Hybrid, Self::Bm25, Self::Vector];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::Bm25 => "bm25",
            Self::Vector => "vector",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown search mode {0:?}, expected one of: hybrid, bm25, vector")]
pub struct ParseSearchModeError(String);

impl FromStr for SearchMode {
    type Err = ParseSearchModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "bm25" | "keyword" => Ok(Self::Bm25),
            "vector" | "semantic" => Ok(Self::Vector),
            _ => Err(ParseSearchModeError(s.to_owned())),
        }
    }
}

/// One indexable slice of a tutorial page.
///
/// Field names match the stored object schema exactly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default, deserialize_with = "nullable")]
    pub page_title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub toc_title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub chunk_text: String,
    #[serde(default, deserialize_with = "nullable")]
    pub page_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub breadcrumb: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub chunk_index: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub video_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_required: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub tutorial_files_used: Vec<String>,
}

/// The index reports absent properties as `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub k: usize,
    /// Weight of the semantic side in hybrid fusion. Ignored by other modes.
    pub alpha: f32,
}

/// A chunk as returned by a backend, carrying whichever native signal the mode produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: Option<f32>,
    pub distance: Option<f32>,
}

/// A retrieved chunk with its normalised confidence score.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub chunk: Chunk,
    pub score: f32,
    pub mode: SearchMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_str() {
        for mode in SearchMode::ALL {
            assert_eq!(mode.to_string().parse::<SearchMode>().unwrap(), mode);
        }
    }

    #[test]
    fn mode_parse_is_case_insensitive() {
        assert_eq!("BM25".parse::<SearchMode>().unwrap(), SearchMode::Bm25);
        assert_eq!(" Vector ".parse::<SearchMode>().unwrap(), SearchMode::Vector);
    }

    #[test]
    fn mode_parse_rejects_unknown() {
        let err = "fuzzy".parse::<SearchMode>().unwrap_err();
        assert!(err.to_string().contains("fuzzy"));
    }

    #[test]
    fn mode_serde_lowercase() {
        let json = serde_json::to_string(&SearchMode::Bm25).unwrap();
        assert_eq!(json, "\"bm25\"");
    }

    #[test]
    fn chunk_deserializes_null_properties() {
        let value = serde_json::json!({
            "page_title": "Walls",
            "toc_title": null,
            "chunk_text": "Draw a wall.",
            "page_url": "https://example.com/walls",
            "breadcrumb": null,
            "chunk_index": 3,
            "video_links": null,
            "category": null,
            "tutorial_files_used": null,
            "_additional": { "score": "0.5" }
        });
        let chunk: Chunk = serde_json::from_value(value).unwrap();
        assert_eq!(chunk.page_title, "Walls");
        assert!(chunk.toc_title.is_empty());
        assert!(chunk.breadcrumb.is_empty());
        assert_eq!(chunk.chunk_index, 3);
        assert_eq!(chunk.category, None);
    }

    #[test]
    fn chunk_serialization_skips_absent_optionals() {
        let chunk = Chunk {
            page_title: "Roofs".into(),
            ..Chunk::default()
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert!(value.get("category").is_none());
        assert!(value.get("breadcrumb").unwrap().as_array().unwrap().is_empty());
    }
}
