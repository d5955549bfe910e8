pub mod typesense;

pub use typesense::TypesenseStore;
