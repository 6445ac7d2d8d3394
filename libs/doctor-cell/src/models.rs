use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_config::DEFAULT_DOCTORS_PAGE_SIZE;
use shared_models::envelope::Pagination;
use shared_models::error::AppError;

/// Specialization value meaning "no filter".
pub const ALL_SPECIALIZATIONS: &str = "all";

/// Page size used to pull the whole directory in one request.
pub const ALL_DOCTORS_LIMIT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub specialization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    pub fn matches_name(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        needle.is_empty() || self.name.to_lowercase().contains(&needle)
    }
}

/// Normalised specialization filter: `None` for absent, blank or "all".
pub fn specialization_filter(specialization: Option<&str>) -> Option<&str> {
    specialization
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(ALL_SPECIALIZATIONS))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorListQuery {
    pub page: u32,
    pub limit: u32,
    pub specialization: Option<String>,
}

impl Default for DoctorListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_DOCTORS_PAGE_SIZE,
            specialization: None,
        }
    }
}

impl DoctorListQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page: page.max(1),
            ..Self::default()
        }
    }

    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = Some(specialization.into());
        self
    }

    pub fn specialization_filter(&self) -> Option<&str> {
        specialization_filter(self.specialization.as_deref())
    }

    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.max(1).to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(specialization) = self.specialization_filter() {
            params.push(("specialization", specialization.to_string()));
        }
        params
    }
}

/// What the patient dashboard's doctor browser asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryFilter {
    pub search: String,
    pub specialization: Option<String>,
    pub page: u32,
}

impl DirectoryFilter {
    pub fn search_term(&self) -> Option<&str> {
        Some(self.search.trim()).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryView {
    pub doctors: Vec<Doctor>,
    pub pagination: Pagination,
    pub is_stale: bool,
    /// Failure of the latest fetch; `doctors` may still hold older data.
    pub error: Option<AppError>,
}
