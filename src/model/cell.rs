use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Cell {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Joshua")]
    pub name: String,
    /// Member who leads this cell
    #[schema(example = 12, nullable = true)]
    pub leader_member_id: Option<u64>,
}
