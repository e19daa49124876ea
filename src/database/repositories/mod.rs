//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod property;
pub mod attendee;
pub mod booking;
pub mod event;
pub mod photo;
pub mod activity;

// Re-export repositories
pub use property::PropertyRepository;
pub use attendee::AttendeeRepository;
pub use booking::BookingRepository;
pub use event::EventRepository;
pub use photo::PhotoRepository;
pub use activity::ActivityRepository;
