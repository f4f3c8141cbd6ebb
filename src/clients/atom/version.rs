/// The Atom dialects still found in the wild. Endpoints predating RFC 4287
/// use the 0.3 namespace and `issued`/`modified` element names; some 1.0
/// endpoints shipped against the publishing-protocol draft namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomProtocolVersion {
    V03,
    V10,
    V10Draft,
}

impl AtomProtocolVersion {
    pub fn atom_ns(self) -> &'static str {
        match self {
            AtomProtocolVersion::V03 => "http://purl.org/atom/ns#",
            _ => "http://www.w3.org/2005/Atom",
        }
    }

    pub fn pub_ns(self) -> &'static str {
        match self {
            AtomProtocolVersion::V10 => "http://www.w3.org/2007/app",
            _ => "http://purl.org/atom/app#",
        }
    }

    /// Element name for the publish timestamp.
    pub fn published_name(self) -> &'static str {
        match self {
            AtomProtocolVersion::V03 => "issued",
            _ => "published",
        }
    }

    pub fn updated_name(self) -> &'static str {
        match self {
            AtomProtocolVersion::V03 => "modified",
            _ => "updated",
        }
    }

    /// Atom 0.3 marks escaped HTML constructs with a `mode` attribute on
    /// top of `type`.
    pub fn uses_content_mode(self) -> bool {
        matches!(self, AtomProtocolVersion::V03)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_names_follow_the_dialect() {
        assert_eq!(AtomProtocolVersion::V03.published_name(), "issued");
        assert_eq!(AtomProtocolVersion::V10.published_name(), "published");
        assert_eq!(AtomProtocolVersion::V10Draft.atom_ns(), AtomProtocolVersion::V10.atom_ns());
        assert_ne!(AtomProtocolVersion::V10Draft.pub_ns(), AtomProtocolVersion::V10.pub_ns());
    }
}
