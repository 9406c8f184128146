use super::ApiEntity;
use serde::Deserialize;

/// An account on the cloud, as returned by `/me`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiUser {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub state: Option<String>,
    pub organization: Option<String>,
    pub time_zone: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub create_time: Option<i64>,
}

impl ApiEntity for ApiUser {
    const ROOT_ELEMENT: Option<&'static str> = Some("user");

    fn id(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }
}
