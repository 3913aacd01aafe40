// src/types/mod.rs
pub mod application;
pub mod listing;

pub use application::{Application, ApplicationEvent, ApplicationStatus, Transition};
pub use listing::{Listing, ListingKey, ScoredListing};
