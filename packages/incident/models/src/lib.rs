#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident category, severity, context and intake form types.
//!
//! These types are shared by every stage of the pipeline: the intake form
//! is validated into an [`IncidentContext`] once the classifier has picked
//! a [`IncidentCategory`] and [`IncidentSeverity`], and that context is then
//! read by the dispatch crew, the CSV log and the chat assistant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How urgent an incident is.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum IncidentSeverity {
    /// No immediate danger to people
    Low,
    /// Potential danger, response needed soon
    Medium,
    /// Immediate danger to life or property
    High,
}

impl IncidentSeverity {
    /// Severity used when classification fails.
    pub const DEFAULT: Self = Self::Medium;

    /// Returns all variants in the order the classifier matches them.
    ///
    /// Highest severity comes first so that a response such as
    /// `"high (not low)"` resolves to [`Self::High`].
    #[must_use]
    pub const fn match_order() -> &'static [Self] {
        &[Self::High, Self::Medium, Self::Low]
    }
}

/// Top-level incident categories. Each one is handled by its own crew.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum IncidentCategory {
    /// Fires, smoke, explosions
    Fire,
    /// Injuries and medical emergencies
    Medical,
    /// Crimes and threats to public safety
    Police,
    /// Traffic and workplace accidents
    Accident,
    /// Anything else
    Other,
}

impl IncidentCategory {
    /// Category used when classification fails.
    pub const DEFAULT: Self = Self::Fire;

    /// Returns all variants of this enum, in classifier match order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Fire,
            Self::Medical,
            Self::Police,
            Self::Accident,
            Self::Other,
        ]
    }
}

/// An image attached to an incident report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// MIME type as reported by the browser (e.g. `image/png`).
    pub mime_type: String,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

impl ImageAttachment {
    /// File extension used when the image is saved next to the report.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        if self.mime_type.ends_with("png") {
            "png"
        } else {
            "jpg"
        }
    }
}

/// The classified record shared between dispatch, logging and chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentContext {
    /// Generated incident identifier (UUID v4).
    pub id: String,
    /// Reporter name.
    pub username: String,
    /// Free-text description of what happened.
    pub description: String,
    /// Coordinates or address.
    pub location: String,
    /// Classified category.
    pub category: IncidentCategory,
    /// Classified severity.
    pub severity: IncidentSeverity,
    /// When the incident was submitted.
    pub reported_at: DateTime<Utc>,
}

impl IncidentContext {
    /// Creates a context for a freshly classified submission.
    #[must_use]
    pub fn new(
        form: &ValidIncidentForm,
        category: IncidentCategory,
        severity: IncidentSeverity,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: form.name.clone(),
            description: form.description.clone(),
            location: form.location.clone(),
            category,
            severity,
            reported_at: Utc::now(),
        }
    }

    /// Submission time formatted for logs and reports.
    #[must_use]
    pub fn reported_at_string(&self) -> String {
        self.reported_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}

/// Form fields that can fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FormField {
    /// Reporter name
    Name,
    /// Incident description
    Description,
    /// Location
    Location,
}

/// A validation failure on a single form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    /// The offending field.
    pub field: FormField,
    /// Message shown next to the field.
    pub message: String,
}

/// Raw intake form submission, before validation.
#[derive(Debug, Clone, Default)]
pub struct IncidentForm {
    /// Reporter name.
    pub name: String,
    /// Incident description.
    pub description: String,
    /// Coordinates or address (may come from browser geolocation).
    pub location: String,
    /// Optional photo of the scene.
    pub image: Option<ImageAttachment>,
}

/// An intake form whose required fields are present, trimmed.
#[derive(Debug, Clone)]
pub struct ValidIncidentForm {
    /// Reporter name.
    pub name: String,
    /// Incident description.
    pub description: String,
    /// Coordinates or address.
    pub location: String,
    /// Optional photo of the scene.
    pub image: Option<ImageAttachment>,
}

impl IncidentForm {
    /// Checks that name, description and location are all non-blank.
    ///
    /// # Errors
    ///
    /// Returns one [`FieldError`] per blank field, in form order.
    pub fn validate(self) -> Result<ValidIncidentForm, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FieldError {
                field: FormField::Name,
                message: "Please enter your name.".to_string(),
            });
        }

        let description = self.description.trim();
        if description.is_empty() {
            errors.push(FieldError {
                field: FormField::Description,
                message: "Please enter the incident description.".to_string(),
            });
        }

        let location = self.location.trim();
        if location.is_empty() {
            errors.push(FieldError {
                field: FormField::Location,
                message: "Please provide a location or enable browser location.".to_string(),
            });
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidIncidentForm {
            name: name.to_string(),
            description: description.to_string(),
            location: location.to_string(),
            image: self.image,
        })
    }
}
