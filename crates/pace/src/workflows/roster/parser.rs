use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::io::Read;

use crate::workflows::applications::domain::{
    StaffId, StaffMember, StaffRole, UniversityId, UserId,
};

/// A roster row that could not be turned into a staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RowProblem {
    pub(crate) line: usize,
    pub(crate) reason: String,
}

pub(crate) enum ParseFailure {
    Csv(csv::Error),
    Row(RowProblem),
}

impl From<csv::Error> for ParseFailure {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub(crate) fn parse_roster<R: Read>(reader: R) -> Result<Vec<StaffMember>, ParseFailure> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut members = Vec::new();
    let mut seen = BTreeSet::new();

    for record in csv_reader.records() {
        let record = record?;
        // blank lines are skipped by the reader, so count from the record itself
        let line = record_line(&record);
        let row: RosterRow = record.deserialize(Some(&headers))?;
        let member = row
            .into_member()
            .map_err(|reason| ParseFailure::Row(RowProblem { line, reason }))?;
        if !seen.insert(member.id) {
            return Err(ParseFailure::Row(RowProblem {
                line,
                reason: format!("staff id {} appears more than once", member.id),
            }));
        }
        members.push(member);
    }

    Ok(members)
}

fn record_line(record: &csv::StringRecord) -> usize {
    record
        .position()
        .map(|position| position.line() as usize)
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    staff_id: u64,
    user_id: u64,
    name: String,
    role: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    universities: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    on_leave: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    active: Option<String>,
}

impl RosterRow {
    fn into_member(self) -> Result<StaffMember, String> {
        if self.name.is_empty() {
            return Err("name is empty".to_string());
        }
        let role = StaffRole::parse(&self.role)
            .ok_or_else(|| format!("unknown role '{}'", self.role))?;
        let assigned_universities = parse_universities(self.universities.as_deref())?;
        let is_on_leave = parse_flag(self.on_leave.as_deref(), false)?;
        let is_active = parse_flag(self.active.as_deref(), true)?;

        Ok(StaffMember {
            id: StaffId(self.staff_id),
            user_id: UserId(self.user_id),
            name: self.name,
            role,
            assigned_universities,
            is_on_leave,
            is_active,
        })
    }
}

fn parse_universities(raw: Option<&str>) -> Result<BTreeSet<UniversityId>, String> {
    let Some(raw) = raw else {
        return Ok(BTreeSet::new());
    };
    raw.split(';')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<u64>()
                .map(UniversityId)
                .map_err(|_| format!("invalid university id '{value}'"))
        })
        .collect()
}

fn parse_flag(raw: Option<&str>, default: bool) -> Result<bool, String> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        other => Err(format!("invalid flag '{other}'")),
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
