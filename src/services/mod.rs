//! Services module
//!
//! This module contains business logic services

pub mod auth;
pub mod attendee;
pub mod checkin;
pub mod reports;
pub mod storage;
pub mod telemetry;

// Re-export commonly used services
pub use auth::{AuthService, Role, Session};
pub use attendee::{AttendeeService, AttendeeProfile, PhotoUpload};
pub use checkin::{CheckInService, CheckInWizard, CheckInDraft, TransportChoice, PaymentChoice, FlightDetails, PropertyOption};
pub use reports::{ReportService, ReportKind};
pub use storage::{BlobStorageService, StoredObject};
pub use telemetry::TelemetryService;

use std::sync::Arc;
use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::state::{ScenarioManager, StateStorage};
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Debug, Clone)]
pub struct ServiceFactory {
    pub database: Arc<DatabaseService>,
    pub auth_service: AuthService,
    pub attendee_service: AttendeeService,
    pub checkin_service: CheckInService,
    pub report_service: ReportService,
    pub storage_service: Arc<BlobStorageService>,
    pub telemetry_service: TelemetryService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(
        settings: Settings,
        database: Arc<DatabaseService>,
        state_storage: Arc<StateStorage>,
    ) -> Result<Self> {
        let storage_service = Arc::new(BlobStorageService::new(settings.storage.clone())?);
        let telemetry_service = TelemetryService::new(settings.telemetry.clone())?;

        let auth_service = AuthService::new(database.clone(), state_storage.clone(), settings.clone());
        let attendee_service = AttendeeService::new(database.clone(), storage_service.clone());
        let wizard = CheckInWizard::new(ScenarioManager::new(), settings.trip.clone());
        let checkin_service = CheckInService::new(wizard, database.clone(), state_storage);
        let report_service = ReportService::new(database.clone(), settings.trip.currency.clone());

        Ok(Self {
            database,
            auth_service,
            attendee_service,
            checkin_service,
            report_service,
            storage_service,
            telemetry_service,
        })
    }
}
