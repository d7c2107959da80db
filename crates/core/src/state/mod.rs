pub mod capture_store;
