//! Lesson record and bundle types
//!
//! `LessonRecord` mirrors whatever the content store returns, with every field
//! optional. `LessonBundle::from_record` applies defaults once so the rest of
//! the player works with a fully-populated, immutable bundle.

use lessonxr_common::events::{AssetKind, NarrationSection};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chapter/topic pair identifying one lesson
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonIds {
    pub chapter_id: String,
    pub topic_id: String,
}

impl LessonIds {
    pub fn new(chapter_id: impl Into<String>, topic_id: impl Into<String>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            topic_id: topic_id.into(),
        }
    }
}

impl fmt::Display for LessonIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chapter_id, self.topic_id)
    }
}

// ---- Raw store shape ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonRecord {
    pub chapter: Option<ChapterRecord>,
    pub topic: Option<TopicRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub learning_objective: Option<String>,
    pub environment: Option<EnvironmentRecord>,
    pub narration: Option<NarrationRecord>,
    pub assets: Option<Vec<AssetRecord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentRecord {
    #[serde(alias = "uri")]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrationRecord {
    pub intro: Option<NarrationEntryRecord>,
    pub explanation: Option<NarrationEntryRecord>,
    pub outro: Option<NarrationEntryRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarrationEntryRecord {
    #[serde(alias = "audioRef")]
    pub audio_url: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetRecord {
    pub id: Option<String>,
    #[serde(alias = "uri")]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
}

// ---- Normalized bundle ----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterInfo {
    pub id: String,
    pub title: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentRef {
    pub uri: String,
    /// Type declared by the record ("panorama", "model", "image/jpeg", ...)
    pub declared_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrationEntry {
    pub audio_ref: Option<String>,
    pub text: Option<String>,
}

impl NarrationEntry {
    pub fn is_usable(&self) -> bool {
        self.audio_ref.is_some() || self.text.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NarrationScript {
    pub intro: Option<NarrationEntry>,
    pub explanation: Option<NarrationEntry>,
    pub outro: Option<NarrationEntry>,
}

impl NarrationScript {
    pub fn entry(&self, section: NarrationSection) -> Option<&NarrationEntry> {
        match section {
            NarrationSection::Intro => self.intro.as_ref(),
            NarrationSection::Explanation => self.explanation.as_ref(),
            NarrationSection::Outro => self.outro.as_ref(),
        }
    }

    pub fn has_text(&self) -> bool {
        NarrationSection::ORDER
            .iter()
            .filter_map(|s| self.entry(*s))
            .any(|e| e.text.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRef {
    pub id: String,
    pub uri: String,
    pub kind: AssetKind,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicInfo {
    pub id: String,
    pub title: String,
    pub learning_objective: Option<String>,
    pub environment: Option<EnvironmentRef>,
    pub narration: NarrationScript,
    pub assets: Vec<AssetRef>,
}

/// Validated lesson descriptor consumed by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonBundle {
    pub chapter: ChapterInfo,
    pub topic: TopicInfo,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn asset_kind(declared: Option<&str>, uri: &str) -> AssetKind {
    let declared = declared.map(|d| d.to_ascii_lowercase());
    match declared.as_deref() {
        Some(d) if d == "image" || d.starts_with("image/") => return AssetKind::Image,
        Some("model") | Some("gltf") | Some("glb") => return AssetKind::Model,
        _ => {}
    }
    match crate::fetch::uri_extension(uri).as_deref() {
        Some("png") | Some("jpg") | Some("jpeg") | Some("webp") => AssetKind::Image,
        _ => AssetKind::Model,
    }
}

impl LessonBundle {
    /// Normalize a raw record, filling gaps from the requested identifiers
    pub fn from_record(record: LessonRecord, ids: Option<&LessonIds>) -> Self {
        let chapter = record.chapter.unwrap_or_default();
        let topic = record.topic.unwrap_or_default();

        let chapter = ChapterInfo {
            id: non_blank(chapter.id)
                .or_else(|| ids.map(|i| i.chapter_id.clone()))
                .unwrap_or_default(),
            title: non_blank(chapter.title).unwrap_or_else(|| "Untitled chapter".to_string()),
            subject: non_blank(chapter.subject),
            grade: non_blank(chapter.grade),
        };

        let environment = topic.environment.and_then(|env| {
            non_blank(env.url).map(|uri| EnvironmentRef {
                uri,
                declared_type: non_blank(env.kind),
            })
        });

        let narration = topic.narration.unwrap_or_default();
        let entry = |e: Option<NarrationEntryRecord>| {
            e.map(|e| NarrationEntry {
                audio_ref: non_blank(e.audio_url),
                text: non_blank(e.text),
            })
            .filter(NarrationEntry::is_usable)
        };
        let narration = NarrationScript {
            intro: entry(narration.intro),
            explanation: entry(narration.explanation),
            outro: entry(narration.outro),
        };

        let assets = topic
            .assets
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(index, asset)| {
                let uri = non_blank(asset.url)?;
                let id = non_blank(asset.id).unwrap_or_else(|| format!("asset-{}", index + 1));
                Some(AssetRef {
                    kind: asset_kind(asset.kind.as_deref(), &uri),
                    display_name: non_blank(asset.name).unwrap_or_else(|| id.clone()),
                    id,
                    uri,
                })
            })
            .collect();

        let topic = TopicInfo {
            id: non_blank(topic.id)
                .or_else(|| ids.map(|i| i.topic_id.clone()))
                .unwrap_or_default(),
            title: non_blank(topic.title).unwrap_or_else(|| "Untitled topic".to_string()),
            learning_objective: non_blank(topic.learning_objective),
            environment,
            narration,
            assets,
        };

        Self { chapter, topic }
    }

    pub fn ids(&self) -> LessonIds {
        LessonIds::new(self.chapter.id.clone(), self.topic.id.clone())
    }

    /// Has an environment or at least one narration text
    pub fn is_playable(&self) -> bool {
        self.topic.environment.is_some() || self.topic.narration.has_text()
    }
}

/// Lesson handed over by a previous screen through the session cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedLesson {
    pub ids: LessonIds,
    pub stored_at: chrono::DateTime<chrono::Utc>,
    pub lesson: LessonRecord,
}

impl CachedLesson {
    pub fn new(ids: LessonIds, lesson: LessonRecord) -> Self {
        Self {
            ids,
            stored_at: chrono::Utc::now(),
            lesson,
        }
    }

    pub fn is_expired(&self, ttl: chrono::Duration) -> bool {
        chrono::Utc::now() - self.stored_at > ttl
    }
}
