// WTT3 (Wyse Timetables) wire-format handling.
//
// The upstream API has gone through several revisions with inconsistent
// field naming and two materially different protocols. Everything that
// understands those shapes lives here:
// - planner: which calendar days a run must query
// - normalizer: heterogeneous wire records -> canonical reservations
// - dedup: collapse records echoed across multiple day slices

pub mod dedup;
pub mod normalizer;
pub mod planner;

pub use dedup::latest_by_external_id;
pub use normalizer::{CanonicalReservation, SkipReason};
