pub mod assemble;
pub mod enrich;
pub mod exclude;
pub mod gather;
pub mod intent;
pub mod llm;
pub mod picks;
pub mod recommend;
pub mod tmdb;
