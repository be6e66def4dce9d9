pub mod import_service;
pub mod resolver;

pub use import_service::{ImportError, ImportReport, ReservationImporter};
