/// One weblog an account can post to, as enumerated by the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogInfo {
    pub id: String,
    pub name: String,
    pub homepage_url: String,
}

impl BlogInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        homepage_url: impl Into<String>,
    ) -> BlogInfo {
        BlogInfo {
            id: id.into(),
            name: name.into(),
            homepage_url: homepage_url.into(),
        }
    }
}
