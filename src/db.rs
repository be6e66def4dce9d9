pub mod error;
pub mod models;
pub mod reservation_repository;
pub mod store;

pub use error::StoreError;
pub use models::*;
pub use reservation_repository::ReservationRepository;
pub use store::ReservationStore;
