pub mod content;
pub mod error;
pub mod images;
pub mod manifest;
pub mod markdown;
pub mod offline;
pub mod seo;
pub mod site;
pub mod sitemap;
pub mod syndication;
