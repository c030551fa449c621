pub mod document;
pub mod importer;
pub mod paths;
pub mod schema;
pub mod slug;
pub mod store;
