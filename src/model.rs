use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

pub const MIN_NAME_LEN: usize = 3;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Owner {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_created: NaiveDateTime,
    pub date_modified: NaiveDateTime,
}

impl Owner {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Pet {
    pub id: i64,
    pub name: String,
    pub breed: String,
    pub date_created: NaiveDateTime,
    pub date_modified: NaiveDateTime,
    pub owner_id: i64,
}

/// Body of `POST /owners`. Client-supplied timestamps are accepted for
/// compatibility and ignored.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OwnerRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<NaiveDateTime>,
}

/// Body of `POST /pets` and `PUT /pets/{pet_id}`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PetRequest {
    pub name: String,
    pub breed: String,
    pub owner_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOwner {
    pub first_name: String,
    pub last_name: String,
    pub now: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPet {
    pub name: String,
    pub breed: String,
    pub owner_id: i64,
    pub now: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetChanges {
    pub name: String,
    pub breed: String,
    pub now: NaiveDateTime,
}

impl OwnerRequest {
    pub fn validate(self) -> ApiResult<NewOwner> {
        check_min_len("first_name", &self.first_name)?;
        check_min_len("last_name", &self.last_name)?;
        Ok(NewOwner {
            first_name: self.first_name,
            last_name: self.last_name,
            now: now_utc(),
        })
    }
}

impl PetRequest {
    pub fn validate(self) -> ApiResult<NewPet> {
        check_min_len("name", &self.name)?;
        check_min_len("breed", &self.breed)?;
        let owner_id = positive_id("owner_id", self.owner_id)?;
        Ok(NewPet {
            name: self.name,
            breed: self.breed,
            owner_id,
            now: now_utc(),
        })
    }
}

impl NewPet {
    pub fn into_changes(self) -> PetChanges {
        PetChanges {
            name: self.name,
            breed: self.breed,
            now: self.now,
        }
    }
}

/// Character count, not bytes: "Zoë" is three long.
pub fn check_min_len(field: &str, value: &str) -> ApiResult<()> {
    if value.chars().count() < MIN_NAME_LEN {
        return Err(ApiError::validation(format!(
            "{} should have at least {} characters",
            field, MIN_NAME_LEN
        )));
    }
    Ok(())
}

pub fn positive_id(field: &str, id: i64) -> ApiResult<i64> {
    if id <= 0 {
        return Err(ApiError::validation(format!("{} must be greater than 0", field)));
    }
    Ok(id)
}

/// Store timestamps are naive UTC with microsecond precision.
pub fn now_utc() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    let micros = now.and_utc().timestamp_micros();
    DateTime::from_timestamp_micros(micros)
        .map(|d| d.naive_utc())
        .unwrap_or(now)
}

/// Inclusive bounds of one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DayRange {
    pub fn of(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN);
        let end = date.and_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(start);
        Self { start, end }
    }

    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        *ts >= self.start && *ts <= self.end
    }
}

/// Accepts `2024-05-01`, `2024-05-01T10:00:00` or a full RFC 3339 timestamp;
/// only the calendar date as written is kept.
pub fn parse_day(raw: &str) -> ApiResult<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt.date());
        }
    }
    Err(ApiError::validation(format!("date_created: invalid date '{}'", raw)))
}
