//! The entities the console lists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A foreign-key column on a list row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    /// Row field holding the referenced id, e.g. `academyId`.
    pub column: &'static str,
    /// Entity the id points at.
    pub target: Resource,
}

const fn fk(column: &'static str, target: Resource) -> ForeignKey {
    ForeignKey { column, target }
}

/// A backend collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Academies,
    Majors,
    Subjects,
    Teachers,
    Students,
    Payments,
    Scores,
}

impl Resource {
    /// Every resource, in menu order.
    pub const ALL: [Resource; 7] = [
        Self::Academies,
        Self::Majors,
        Self::Subjects,
        Self::Teachers,
        Self::Students,
        Self::Payments,
        Self::Scores,
    ];

    /// Collection path, e.g. `/students`.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Academies => "/academies",
            Self::Majors => "/majors",
            Self::Subjects => "/subjects",
            Self::Teachers => "/teachers",
            Self::Students => "/students",
            Self::Payments => "/payments",
            Self::Scores => "/scores",
        }
    }

    /// Field of a single record that names it for display.
    #[must_use]
    pub fn name_field(self) -> &'static str {
        match self {
            Self::Academies => "academyName",
            Self::Majors => "majorName",
            Self::Subjects => "subjectName",
            Self::Teachers => "teacherName",
            Self::Students => "studentName",
            Self::Payments => "paymentName",
            Self::Scores => "scoreName",
        }
    }

    /// Foreign-key columns shown on this resource's list.
    #[must_use]
    pub fn foreign_keys(self) -> &'static [ForeignKey] {
        const MAJORS: &[ForeignKey] = &[fk("academyId", Resource::Academies)];
        const SUBJECTS: &[ForeignKey] = &[fk("majorId", Resource::Majors)];
        const TEACHERS: &[ForeignKey] = &[fk("academyId", Resource::Academies)];
        const STUDENTS: &[ForeignKey] = &[
            fk("academyId", Resource::Academies),
            fk("majorId", Resource::Majors),
        ];
        const PAYMENTS: &[ForeignKey] = &[fk("studentId", Resource::Students)];
        const SCORES: &[ForeignKey] = &[
            fk("studentId", Resource::Students),
            fk("subjectId", Resource::Subjects),
        ];

        match self {
            Self::Academies => &[],
            Self::Majors => MAJORS,
            Self::Subjects => SUBJECTS,
            Self::Teachers => TEACHERS,
            Self::Students => STUDENTS,
            Self::Payments => PAYMENTS,
            Self::Scores => SCORES,
        }
    }

    /// Returns true if only administrators may open this resource.
    #[must_use]
    pub fn admin_only(self) -> bool {
        matches!(self, Self::Academies | Self::Teachers | Self::Payments)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.path().trim_start_matches('/')
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownResource(pub String);

impl fmt::Display for UnknownResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource '{}'", self.0)
    }
}

impl std::error::Error for UnknownResource {}

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('/').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|resource| resource.as_str() == name)
            .ok_or_else(|| UnknownResource(s.to_string()))
    }
}
