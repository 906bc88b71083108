pub mod retriever;
pub mod sqlite;
pub mod store;

pub use retriever::VectorRetriever;
pub use sqlite::SqliteChunkStore;
pub use store::{Passage, Retriever};
