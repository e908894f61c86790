//! Staff roster import from CSV exports of the HR sheet.
//!
//! Expected header: `staff_id,user_id,name,role,universities,on_leave,active`
//! with universities separated by `;`. Blank flags fall back to "not on
//! leave" and "active".

mod parser;

use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

use crate::workflows::applications::domain::StaffMember;
use crate::workflows::applications::store::{ApplicationStore, RepositoryError};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: usize, reason: String },
    Repository(RepositoryError),
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read staff roster: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid staff roster CSV data: {}", err),
            RosterImportError::InvalidRow { line, reason } => {
                write!(f, "staff roster line {}: {}", line, reason)
            }
            RosterImportError::Repository(err) => {
                write!(f, "could not store staff roster: {}", err)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::InvalidRow { .. } => None,
            RosterImportError::Repository(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<RepositoryError> for RosterImportError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

fn import_error(failure: parser::ParseFailure) -> RosterImportError {
    match failure {
        parser::ParseFailure::Csv(err) => RosterImportError::Csv(err),
        parser::ParseFailure::Row(problem) => RosterImportError::InvalidRow {
            line: problem.line,
            reason: problem.reason,
        },
    }
}

pub struct RosterImporter;

impl RosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<StaffMember>, RosterImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parses every row or fails on the first malformed or repeated one.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<StaffMember>, RosterImportError> {
        parser::parse_roster(reader).map_err(import_error)
    }

    /// Upserts `members` in one unit of work and returns how many were stored.
    /// Universities missing from the directory are kept but reported.
    pub fn load_into<S: ApplicationStore>(
        store: &S,
        members: Vec<StaffMember>,
    ) -> Result<usize, RosterImportError> {
        let count = members.len();
        store.atomically(|tx| {
            for member in members {
                for university in &member.assigned_universities {
                    if tx.university(*university)?.is_none() {
                        warn!(
                            staff_id = %member.id,
                            university_id = %university,
                            "roster references unknown university"
                        );
                    }
                }
                tx.put_staff_member(member)?;
            }
            Ok::<_, RosterImportError>(())
        })?;
        info!(count, "staff roster loaded");
        Ok(count)
    }
}
