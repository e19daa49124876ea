//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod property;
pub mod attendee;
pub mod booking;
pub mod event;
pub mod photo;
pub mod activity;
pub mod checkin;

// Re-export commonly used models
pub use property::{Property, PropertyOccupancy, CreatePropertyRequest, UpdatePropertyRequest};
pub use attendee::{Attendee, CreateAttendeeRequest, UpdateAttendeeRequest, TransportDetails};
pub use booking::{Booking, PaymentMethod, PaymentStatus, PaymentUpdate, CreateBookingRequest, UpdateBookingRequest};
pub use event::{Event, EventAttendee, EventInterestCount, EventListing, CreateEventRequest, UpdateEventRequest};
pub use photo::{Photo, CreatePhotoRequest};
pub use activity::{ActivityLog, ActivityAction, ActionCount, CreateActivityRequest};
pub use checkin::CheckInOutcome;
