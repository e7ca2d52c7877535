use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Administrative reporting period, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Semester {
    #[schema(example = 4)]
    pub id: u64,
    #[schema(example = "2025 Spring")]
    pub name: String,
    #[schema(example = "2025-03-02", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2025-06-29", value_type = String, format = "date")]
    pub end_date: NaiveDate,
}

impl Semester {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Semester containing `date`. Overlapping semesters resolve to the one
/// that started first.
pub fn semester_for(date: NaiveDate, semesters: &[Semester]) -> Option<&Semester> {
    semesters
        .iter()
        .filter(|s| s.contains(date))
        .min_by_key(|s| (s.start_date, s.id))
}

pub fn current_semester(semesters: &[Semester], today: NaiveDate) -> Option<&Semester> {
    semester_for(today, semesters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn semester(id: u64, start: NaiveDate, end: NaiveDate) -> Semester {
        Semester {
            id,
            name: format!("S{id}"),
            start_date: start,
            end_date: end,
        }
    }

    #[test]
    fn contains_is_inclusive() {
        let s = semester(1, d(2025, 3, 1), d(2025, 6, 30));
        assert!(s.contains(d(2025, 3, 1)));
        assert!(s.contains(d(2025, 6, 30)));
        assert!(!s.contains(d(2025, 2, 28)));
        assert!(!s.contains(d(2025, 7, 1)));
    }

    #[test]
    fn picks_earliest_start_on_overlap() {
        let semesters = vec![
            semester(2, d(2025, 6, 1), d(2025, 8, 31)),
            semester(1, d(2025, 3, 1), d(2025, 6, 30)),
        ];
        assert_eq!(semester_for(d(2025, 6, 15), &semesters).map(|s| s.id), Some(1));
        assert_eq!(semester_for(d(2025, 7, 15), &semesters).map(|s| s.id), Some(2));
        assert!(current_semester(&semesters, d(2025, 12, 25)).is_none());
    }
}
