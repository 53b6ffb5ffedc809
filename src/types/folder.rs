use serde::{Deserialize, Serialize};

/// A folder grouping sessions in list views.
///
/// `parent_id` allows one level of nesting; it is not enforced acyclic.
/// Deleting a folder cascades to its direct child folders but never to the
/// sessions referencing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub position: i32,
    pub created_at: i64,
    pub updated_at: i64,
}
