#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub id: String,
    pub name: String,
}

impl AuthorInfo {
    /// Some services return authors with an empty display name; the id is
    /// shown in that case.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> AuthorInfo {
        let id = id.into();
        let name = name.into();
        let name = if name.is_empty() { id.clone() } else { name };
        AuthorInfo { id, name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_fall_back_to_the_id() {
        assert_eq!(AuthorInfo::new("42", "").name, "42");
        assert_eq!(AuthorInfo::new("42", "Ann").name, "Ann");
    }
}
