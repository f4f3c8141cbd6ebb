use chrono::{DateTime, Utc};

/// A static page, as listed for parent-page pickers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub id: String,
    pub title: String,
    pub date_published: Option<DateTime<Utc>>,
    /// Empty when the page is top-level or the service has no page
    /// hierarchy.
    pub parent_id: String,
}

impl PageInfo {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        date_published: Option<DateTime<Utc>>,
        parent_id: impl Into<String>,
    ) -> PageInfo {
        PageInfo {
            id: id.into(),
            title: title.into(),
            date_published,
            parent_id: parent_id.into(),
        }
    }
}
