use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Grace Kim",
        "phone": "+82-10-1234-5678",
        "birth_date": "1992-05-17",
        "cell_id": 3,
        "cell_assignment_date": "2025-03-02"
    })
)]
pub struct Member {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "Grace Kim")]
    pub name: String,

    #[schema(example = "+82-10-1234-5678", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "1992-05-17", value_type = Option<String>, format = "date")]
    pub birth_date: Option<NaiveDate>,

    #[schema(example = 3, nullable = true)]
    pub cell_id: Option<u64>,

    /// Day the member joined their current cell
    #[schema(example = "2025-03-02", value_type = Option<String>, format = "date")]
    pub cell_assignment_date: Option<NaiveDate>,
}

impl Member {
    /// A member counts for a Sunday once they have joined the cell, the
    /// assignment day itself included. No assignment date means always.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.cell_assignment_date.is_none_or(|joined| joined <= day)
    }
}
