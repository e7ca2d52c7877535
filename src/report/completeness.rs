use std::collections::{BTreeSet, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{attendance::AttendanceRecord, member::Member};
use crate::report::window::ReportWindow;

/// Roll-call state of one Sunday that had at least one active member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct WeekStatus {
    #[schema(example = "2025-03-09", value_type = String, format = "date")]
    pub sunday: NaiveDate,
    #[schema(example = 8)]
    pub active_members: usize,
    #[schema(example = 7)]
    pub checked_members: usize,
    /// Active members without a present/absent mark, ascending
    #[schema(example = json!([12]))]
    pub missing_member_ids: Vec<u64>,
}

impl WeekStatus {
    pub fn is_complete(&self) -> bool {
        self.missing_member_ids.is_empty()
    }
}

/// Sundays from the first one on or after `start` up to `end`, inclusive.
pub fn target_sundays(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let offset = (7 - start.weekday().num_days_from_sunday()) % 7;
    let first = start + Duration::days(offset as i64);
    std::iter::successors(Some(first), |sunday| sunday.checked_add_signed(Duration::days(7)))
        .take_while(move |sunday| *sunday <= end)
}

/// Per-Sunday breakdown of `window`, capped at `today`.
///
/// Sundays after `today` are never evaluated. Sundays where nobody had
/// joined the cell yet are left out entirely.
pub fn weekly_completeness(
    members: &[Member],
    attendances: &[AttendanceRecord],
    window: Option<ReportWindow>,
    today: NaiveDate,
) -> Vec<WeekStatus> {
    let Some(window) = window else {
        return Vec::new();
    };
    if members.is_empty() {
        return Vec::new();
    }

    let effective_end = window.end_date.min(today);
    if window.start_date > effective_end {
        return Vec::new();
    }

    let checked: HashSet<(u64, NaiveDate)> = attendances
        .iter()
        .filter(|record| record.status.is_checked())
        .map(|record| (record.member_id, record.date))
        .collect();

    target_sundays(window.start_date, effective_end)
        .filter_map(|sunday| {
            let active: BTreeSet<u64> = members
                .iter()
                .filter(|m| m.is_active_on(sunday))
                .map(|m| m.id)
                .collect();
            if active.is_empty() {
                return None;
            }

            let missing_member_ids: Vec<u64> = active
                .iter()
                .copied()
                .filter(|id| !checked.contains(&(*id, sunday)))
                .collect();

            Some(WeekStatus {
                sunday,
                active_members: active.len(),
                checked_members: active.len() - missing_member_ids.len(),
                missing_member_ids,
            })
        })
        .collect()
}

/// Number of Sundays in `window` (up to `today`) where at least one active
/// member has no present/absent mark.
pub fn count_incomplete_weeks(
    members: &[Member],
    attendances: &[AttendanceRecord],
    window: Option<ReportWindow>,
    today: NaiveDate,
) -> usize {
    weekly_completeness(members, attendances, window, today)
        .iter()
        .filter(|week| !week.is_complete())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn member(id: u64, joined: Option<NaiveDate>) -> Member {
        Member {
            id,
            name: format!("Member {id}"),
            phone: None,
            birth_date: None,
            cell_id: Some(1),
            cell_assignment_date: joined,
        }
    }

    fn record(member_id: u64, date: NaiveDate, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            member_id,
            date,
            status,
        }
    }

    fn window(start: NaiveDate, end: NaiveDate) -> Option<ReportWindow> {
        Some(ReportWindow {
            start_date: start,
            end_date: end,
        })
    }

    // 2025-03-02, 03-09 and 03-16 are Sundays.
    const TODAY: (i32, u32, u32) = (2025, 6, 1);

    fn today() -> NaiveDate {
        d(TODAY.0, TODAY.1, TODAY.2)
    }

    #[test]
    fn sundays_start_on_or_after_start() {
        let sundays: Vec<_> = target_sundays(d(2025, 3, 2), d(2025, 3, 16)).collect();
        assert_eq!(sundays, vec![d(2025, 3, 2), d(2025, 3, 9), d(2025, 3, 16)]);

        let sundays: Vec<_> = target_sundays(d(2025, 3, 3), d(2025, 3, 15)).collect();
        assert_eq!(sundays, vec![d(2025, 3, 9)]);
        assert!(sundays.iter().all(|s| s.weekday() == Weekday::Sun));

        assert_eq!(target_sundays(d(2025, 3, 3), d(2025, 3, 8)).count(), 0);
    }

    #[test]
    fn empty_members_is_zero() {
        let records = vec![record(1, d(2025, 3, 2), AttendanceStatus::Present)];
        assert_eq!(
            count_incomplete_weeks(&[], &records, window(d(2025, 1, 1), d(2025, 5, 1)), today()),
            0
        );
        assert_eq!(count_incomplete_weeks(&[], &[], None, today()), 0);
    }

    #[test]
    fn missing_window_is_zero() {
        let members = vec![member(1, None)];
        assert_eq!(count_incomplete_weeks(&members, &[], None, today()), 0);
    }

    #[test]
    fn inverted_window_is_zero() {
        let members = vec![member(1, None)];
        assert_eq!(
            count_incomplete_weeks(&members, &[], window(d(2025, 3, 16), d(2025, 3, 2)), today()),
            0
        );
    }

    #[test]
    fn window_entirely_in_future_is_zero() {
        let members = vec![member(1, None)];
        assert_eq!(
            count_incomplete_weeks(&members, &[], window(d(2025, 9, 1), d(2025, 12, 31)), today()),
            0
        );
    }

    #[test]
    fn one_gap_in_three_sundays() {
        let members = vec![member(1, None)];
        let records = vec![
            record(1, d(2025, 3, 2), AttendanceStatus::Present),
            record(1, d(2025, 3, 16), AttendanceStatus::Present),
        ];
        let window = window(d(2025, 3, 1), d(2025, 3, 21));

        assert_eq!(count_incomplete_weeks(&members, &records, window, today()), 1);

        let weeks = weekly_completeness(&members, &records, window, today());
        assert_eq!(weeks.len(), 3);
        assert_eq!(weeks[1].sunday, d(2025, 3, 9));
        assert_eq!(weeks[1].missing_member_ids, vec![1]);
        assert!(weeks[0].is_complete());
        assert!(weeks[2].is_complete());
    }

    #[test]
    fn absent_counts_as_checked() {
        let members = vec![member(1, None), member(2, None)];
        let records = vec![
            record(1, d(2025, 3, 2), AttendanceStatus::Present),
            record(2, d(2025, 3, 2), AttendanceStatus::Absent),
        ];
        let weeks = weekly_completeness(&members, &records, window(d(2025, 3, 2), d(2025, 3, 2)), today());
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].active_members, 2);
        assert_eq!(weeks[0].checked_members, 2);
        assert!(weeks[0].is_complete());
    }

    #[test]
    fn future_sundays_are_not_counted() {
        // today is a Wednesday; the next Sunday has no roll yet
        let today = d(2025, 3, 12);
        let members = vec![member(1, None)];
        let records = vec![record(1, d(2025, 3, 2), AttendanceStatus::Present)];

        let to_future = count_incomplete_weeks(&members, &records, window(d(2025, 2, 24), d(2025, 4, 27)), today);
        let to_today = count_incomplete_weeks(&members, &records, window(d(2025, 2, 24), today), today);

        assert_eq!(to_future, to_today);
        assert_eq!(to_today, 1);
    }

    #[test]
    fn todays_sunday_is_evaluated() {
        let today = d(2025, 3, 9);
        let members = vec![member(1, None)];
        assert_eq!(
            count_incomplete_weeks(&members, &[], window(d(2025, 3, 9), d(2025, 3, 30)), today),
            1
        );
    }

    #[test]
    fn member_assigned_after_sunday_is_inactive() {
        let members = vec![member(1, Some(d(2025, 3, 3)))];
        let window = window(d(2025, 3, 1), d(2025, 3, 7));

        assert_eq!(count_incomplete_weeks(&members, &[], window, today()), 0);
        assert!(weekly_completeness(&members, &[], window, today()).is_empty());
    }

    #[test]
    fn member_assigned_on_sunday_is_active() {
        let members = vec![member(1, Some(d(2025, 3, 2)))];
        assert_eq!(
            count_incomplete_weeks(&members, &[], window(d(2025, 3, 1), d(2025, 3, 7)), today()),
            1
        );
    }

    #[test]
    fn late_joiner_only_counts_from_assignment() {
        let members = vec![member(1, None), member(2, Some(d(2025, 3, 10)))];
        let records = vec![
            record(1, d(2025, 3, 2), AttendanceStatus::Present),
            record(1, d(2025, 3, 9), AttendanceStatus::Present),
            record(1, d(2025, 3, 16), AttendanceStatus::Present),
        ];
        let weeks = weekly_completeness(&members, &records, window(d(2025, 3, 1), d(2025, 3, 16)), today());

        assert_eq!(weeks.iter().map(|w| w.active_members).collect::<Vec<_>>(), vec![1, 1, 2]);
        assert_eq!(weeks[2].missing_member_ids, vec![2]);
        assert_eq!(count_incomplete_weeks(&members, &records, window(d(2025, 3, 1), d(2025, 3, 16)), today()), 1);
    }

    #[test]
    fn placeholder_status_does_not_check() {
        let members = vec![member(1, None)];
        let records = vec![record(1, d(2025, 3, 2), AttendanceStatus::Other("unset".into()))];
        assert_eq!(
            count_incomplete_weeks(&members, &records, window(d(2025, 3, 2), d(2025, 3, 2)), today()),
            1
        );
    }

    #[test]
    fn records_on_other_days_do_not_check() {
        let members = vec![member(1, None)];
        let records = vec![record(1, d(2025, 3, 3), AttendanceStatus::Present)];
        assert_eq!(
            count_incomplete_weeks(&members, &records, window(d(2025, 3, 2), d(2025, 3, 8)), today()),
            1
        );
    }

    #[test]
    fn duplicate_records_are_harmless() {
        let members = vec![member(1, None)];
        let records = vec![
            record(1, d(2025, 3, 2), AttendanceStatus::Other("unset".into())),
            record(1, d(2025, 3, 2), AttendanceStatus::Present),
            record(1, d(2025, 3, 2), AttendanceStatus::Present),
        ];
        let weeks = weekly_completeness(&members, &records, window(d(2025, 3, 2), d(2025, 3, 2)), today());
        assert_eq!(weeks[0].checked_members, 1);
        assert!(weeks[0].is_complete());
    }

    #[test]
    fn same_inputs_same_result() {
        let members = vec![member(1, None), member(2, Some(d(2025, 3, 5)))];
        let records = vec![
            record(1, d(2025, 3, 2), AttendanceStatus::Present),
            record(2, d(2025, 3, 9), AttendanceStatus::Absent),
        ];
        let window = window(d(2025, 3, 1), d(2025, 3, 31));

        let first = count_incomplete_weeks(&members, &records, window, today());
        let second = count_incomplete_weeks(&members, &records, window, today());
        assert_eq!(first, second);
        assert_eq!(
            weekly_completeness(&members, &records, window, today()),
            weekly_completeness(&members, &records, window, today())
        );
    }
}
