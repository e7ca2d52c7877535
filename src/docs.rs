use crate::api::attendance::{AttendanceQuery, RollEntry, SaveRoll};
use crate::api::cell::CreateCell;
use crate::api::member::{
    AssignCell, CreateMember, MemberListResponse, MemberQuery, MemberView, UpdateMember,
};
use crate::api::report::{
    CellCompleteness, CompletenessQuery, CompletenessReport, EvaluateCompleteness, MissingMember,
    OverviewQuery, RawAttendance, RosterEntry, WeekReport,
};
use crate::api::semester::CreateSemester;
use crate::model::{attendance::AttendanceRecord, cell::Cell, member::Member, semester::Semester};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cell Group API",
        version = "0.1.0",
        description = r#"
## Cell Group Management API

Backend for the church cell group system: rosters, Sunday attendance and
completeness reporting.

### Key Features
- **Cells and members**
  - Cell rosters, member records, cell assignment with joining date
- **Attendance**
  - Sunday roll capture per cell (present / absent)
- **Semesters**
  - Reporting periods used as default report windows
- **Reports**
  - Number of Sundays with missing check-ins, per cell and window

### Security
Everything under the API prefix needs a **JWT Bearer** access token.
Admins manage all cells; leaders manage the roll of the cell they lead.
"#,
    ),
    paths(
        crate::api::cell::list_cells,
        crate::api::cell::create_cell,
        crate::api::cell::cell_members,

        crate::api::member::list_members,
        crate::api::member::get_member,
        crate::api::member::create_member,
        crate::api::member::update_member,
        crate::api::member::assign_cell,
        crate::api::member::delete_member,

        crate::api::attendance::list_attendance,
        crate::api::attendance::save_roll,

        crate::api::semester::list_semesters,
        crate::api::semester::get_current_semester,
        crate::api::semester::create_semester,

        crate::api::report::cell_completeness,
        crate::api::report::cells_completeness,
        crate::api::report::evaluate_completeness
    ),
    components(
        schemas(
            Cell,
            CreateCell,
            Member,
            MemberView,
            CreateMember,
            UpdateMember,
            AssignCell,
            MemberQuery,
            MemberListResponse,
            AttendanceRecord,
            AttendanceQuery,
            RollEntry,
            SaveRoll,
            Semester,
            CreateSemester,
            CompletenessQuery,
            CompletenessReport,
            OverviewQuery,
            CellCompleteness,
            WeekReport,
            MissingMember,
            EvaluateCompleteness,
            RosterEntry,
            RawAttendance
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Cell", description = "Cell management APIs"),
        (name = "Member", description = "Member roster APIs"),
        (name = "Attendance", description = "Sunday attendance APIs"),
        (name = "Semester", description = "Reporting period APIs"),
        (name = "Report", description = "Attendance completeness reports"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
