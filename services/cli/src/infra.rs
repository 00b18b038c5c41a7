use bto_allocation::allocation::{
    AllocationDesk, ApplicantState, Decision, FlatDraft, FlatType, Identity, MaritalStatus,
    ProjectName, Role, User,
};
use bto_allocation::error::AppError;
use bto_allocation::storage::{AllocationStore, StoreError};
use chrono::{Local, NaiveDate};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

/// One desk serves every request; operations run one at a time.
pub(crate) type SharedDesk<S> = Arc<Mutex<AllocationDesk<S>>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn lock_desk<S>(desk: &SharedDesk<S>) -> Result<MutexGuard<'_, AllocationDesk<S>>, AppError>
where
    S: AllocationStore + 'static,
{
    desk.lock().map_err(|_| {
        AppError::Store(StoreError::Unavailable(
            "allocation desk lock poisoned".to_string(),
        ))
    })
}

/// Public face of a user; never carries the credential.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserView {
    pub(crate) identity: Identity,
    pub(crate) name: String,
    pub(crate) age: u8,
    pub(crate) marital_status: MaritalStatus,
    pub(crate) role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) applicant_state: Option<ApplicantState>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            identity: user.identity.clone(),
            name: user.name.clone(),
            age: user.age,
            marital_status: user.marital_status,
            role: user.role(),
            applicant_state: user.applicant_state().cloned(),
        }
    }
}

pub(crate) fn today_or_now(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| Local::now().date_naive())
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

pub(crate) fn parse_identity(raw: &str) -> Result<Identity, String> {
    Identity::parse(raw).map_err(|err| err.to_string())
}

pub(crate) fn parse_project(raw: &str) -> Result<ProjectName, String> {
    ProjectName::new(raw).map_err(|err| err.to_string())
}

pub(crate) fn parse_flat_type(raw: &str) -> Result<FlatType, String> {
    FlatType::parse(raw).map_err(|err| err.to_string())
}

pub(crate) fn parse_marital_status(raw: &str) -> Result<MaritalStatus, String> {
    MaritalStatus::parse(raw).map_err(|err| err.to_string())
}

pub(crate) fn parse_decision(raw: &str) -> Result<Decision, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "approve" | "approved" | "yes" => Ok(Decision::Approve),
        "reject" | "rejected" | "no" => Ok(Decision::Reject),
        other => Err(format!("expected approve or reject, got '{other}'")),
    }
}

/// `2-Room:10:350000` as flat type, unit count, and price.
pub(crate) fn parse_flat_draft(raw: &str) -> Result<FlatDraft, String> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    let [flat_type, units, price] = parts.as_slice() else {
        return Err(format!("expected TYPE:UNITS:PRICE, got '{raw}'"));
    };
    Ok(FlatDraft {
        flat_type: parse_flat_type(flat_type)?,
        units: parse_number(units, "units")?,
        price: parse_number(price, "price")?,
    })
}

/// `2-Room:12` style pairs used by project updates.
pub(crate) fn parse_flat_amount<T>(raw: &str) -> Result<(FlatType, T), String>
where
    T: std::str::FromStr,
{
    let Some((flat_type, amount)) = raw.split_once(':') else {
        return Err(format!("expected TYPE:AMOUNT, got '{raw}'"));
    };
    Ok((parse_flat_type(flat_type.trim())?, parse_number(amount.trim(), "amount")?))
}

fn parse_number<T: std::str::FromStr>(raw: &str, field: &str) -> Result<T, String> {
    raw.parse::<T>()
        .map_err(|_| format!("{field} must be a non-negative whole number, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_drafts_read_type_units_and_price() {
        let draft = parse_flat_draft("3-Room: 8 :290000").expect("valid draft");
        assert_eq!(draft.flat_type, FlatType::ThreeRoom);
        assert_eq!(draft.units, 8);
        assert_eq!(draft.price, 290_000);

        assert!(parse_flat_draft("3-Room:8").is_err());
        assert!(parse_flat_draft("4-Room:8:1").is_err());
        assert!(parse_flat_draft("2-Room:-1:1").is_err());
    }

    #[test]
    fn flat_amounts_parse_into_the_requested_width() {
        let (flat_type, units) = parse_flat_amount::<u32>("two_room:12").expect("valid pair");
        assert_eq!((flat_type, units), (FlatType::TwoRoom, 12));
        assert!(parse_flat_amount::<u64>("2-Room").is_err());
    }

    #[test]
    fn decisions_and_dates_parse_leniently() {
        assert_eq!(parse_decision(" Approve ").unwrap(), Decision::Approve);
        assert_eq!(parse_decision("rejected").unwrap(), Decision::Reject);
        assert!(parse_decision("maybe").is_err());
        assert_eq!(
            parse_date("2025-04-01").unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
        );
        assert!(parse_date("01/04/2025").is_err());
    }
}
