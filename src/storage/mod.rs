pub mod engine;
pub mod models;

pub use engine::{
    ChapterFilter, CreateChapterParams, CreateKomikParams, ListParams, Storage, StoreError,
    StoreResult, UpdateChapterParams, UpdateKomikParams,
};
