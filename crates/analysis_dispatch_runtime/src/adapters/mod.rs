pub mod catalog;
pub mod catalog_resolver;
pub mod file_listing;
pub mod job_store;
pub mod ledger;
