pub mod error;
pub mod experience;
pub mod posts;
pub mod seo;
