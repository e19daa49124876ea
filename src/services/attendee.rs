//! Attendee-facing operations outside the check-in wizard

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use chrono::Utc;
use tracing::info;
use crate::database::DatabaseService;
use crate::models::{
    ActivityAction, Attendee, Booking, CreateActivityRequest, CreatePhotoRequest, EventListing,
    Photo, Property, TransportDetails, UpdateAttendeeRequest,
};
use crate::services::storage::BlobStorageService;
use crate::utils::errors::{CbxError, Result};
use crate::utils::helpers::{is_valid_email, is_valid_phone, normalize_phone};

/// What an attendee sees with `/me`
#[derive(Debug, Clone)]
pub struct AttendeeProfile {
    pub attendee: Attendee,
    pub booking: Option<Booking>,
    pub property: Option<Property>,
}

/// A photo waiting to be stored
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AttendeeService {
    database: Arc<DatabaseService>,
    storage: Arc<BlobStorageService>,
}

impl AttendeeService {
    pub fn new(database: Arc<DatabaseService>, storage: Arc<BlobStorageService>) -> Self {
        Self { database, storage }
    }

    pub async fn profile(&self, attendee_id: i64) -> Result<AttendeeProfile> {
        let attendee = self.database.attendees.find_by_id(attendee_id).await?
            .ok_or(CbxError::AttendeeNotFound { attendee_id })?;
        let booking = self.database.bookings.find_for_attendee(attendee_id).await?;
        let property = match &booking {
            Some(b) => self.database.properties.find_by_id(b.property_id).await?,
            None => None,
        };

        Ok(AttendeeProfile { attendee, booking, property })
    }

    /// Change email or phone. Values are validated and the phone normalized.
    pub async fn update_contact(&self, attendee_id: i64, email: Option<String>, phone: Option<String>) -> Result<Attendee> {
        if let Some(email) = &email {
            if !is_valid_email(email) {
                return Err(CbxError::InvalidInput("profile.invalid_email".to_string()));
            }
        }
        let phone = match phone {
            Some(raw) => {
                let normalized = normalize_phone(&raw);
                if !is_valid_phone(&normalized) {
                    return Err(CbxError::InvalidInput("auth.invalid_phone".to_string()));
                }
                Some(normalized)
            }
            None => None,
        };

        let attendee = self.database.attendees.update(attendee_id, UpdateAttendeeRequest {
            name: None,
            phone,
            email,
        }).await?;
        info!(attendee_id, "Contact details updated");
        Ok(attendee)
    }

    pub async fn update_transport(&self, attendee_id: i64, transport: &TransportDetails) -> Result<Attendee> {
        self.database.attendees.update_transport(attendee_id, transport).await
    }

    /// Flip interest in an event and return whether the attendee is now interested
    pub async fn toggle_event_interest(&self, attendee_id: i64, event_id: i64) -> Result<bool> {
        if self.database.events.find_by_id(event_id).await?.is_none() {
            return Err(CbxError::EventNotFound { event_id });
        }

        let interested = self.database.events.toggle_interest(event_id, attendee_id).await?;
        info!(attendee_id, event_id, interested, "Event interest toggled");
        Ok(interested)
    }

    /// Upcoming events with this attendee's interest and the total count
    pub async fn event_listing(&self, attendee_id: Option<i64>) -> Result<Vec<EventListing>> {
        let events = self.database.events.list_upcoming(Utc::now(), 50).await?;
        let counts: HashMap<i64, i64> = self.database.events.interest_counts().await?
            .into_iter()
            .map(|c| (c.event_id, c.interested))
            .collect();
        let mine: HashSet<i64> = match attendee_id {
            Some(id) => self.database.events.interests_for_attendee(id).await?.into_iter().collect(),
            None => HashSet::new(),
        };

        Ok(events
            .into_iter()
            .map(|event| EventListing {
                interested: mine.contains(&event.id),
                interest_count: counts.get(&event.id).copied().unwrap_or(0),
                event,
            })
            .collect())
    }

    /// Store a photo in the bucket and record it
    pub async fn add_photo(&self, attendee: &Attendee, upload: PhotoUpload) -> Result<Photo> {
        let stored = self.storage
            .upload_photo(attendee.id, upload.bytes, &upload.content_type, &upload.filename)
            .await?;

        let photo = self.database.photos.create(CreatePhotoRequest {
            attendee_id: Some(attendee.id),
            object_key: stored.key.clone(),
            url: stored.url,
            content_type: stored.content_type,
            size_bytes: stored.size_bytes as i64,
            width: upload.width,
            height: upload.height,
            caption: upload.caption,
        }).await;

        let photo = match photo {
            Ok(photo) => photo,
            Err(e) => {
                // Keep the bucket free of objects without a row
                if let Err(cleanup) = self.storage.delete_object(&stored.key).await {
                    tracing::warn!(key = %stored.key, error = %cleanup, "Failed to remove orphaned object");
                }
                return Err(e);
            }
        };

        self.database.record_activity(
            CreateActivityRequest::new(ActivityAction::PhotoUploaded)
                .attendee(attendee.id)
                .details(serde_json::json!({ "photo_id": photo.id, "size_bytes": photo.size_bytes })),
        ).await;

        Ok(photo)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.storage.max_upload_bytes()
    }
}
