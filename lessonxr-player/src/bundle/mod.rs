//! Lesson bundle loading

pub mod loader;
pub mod model;
pub mod store;

pub use loader::{BundleLoader, ContentStore, SessionCache, ACTIVE_LESSON_KEY};
pub use model::{
    AssetRecord, AssetRef, CachedLesson, ChapterInfo, ChapterRecord, EnvironmentRecord,
    EnvironmentRef, LessonBundle, LessonIds, LessonRecord, NarrationEntry, NarrationEntryRecord,
    NarrationRecord, NarrationScript, TopicInfo, TopicRecord,
};
pub use store::{FileContentStore, FileSessionCache, HttpContentStore, MemorySessionCache};
