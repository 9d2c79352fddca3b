use std::fmt;

/// A function identity: a bare name, or a bare name plus a replica index when
/// the owning action's `Rank` is greater than 1.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionIdentity {
    pub bare_name: String,
    pub replica: Option<u32>,
}

impl FunctionIdentity {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            bare_name: name.into(),
            replica: None,
        }
    }

    pub fn replica(name: impl Into<String>, index: u32) -> Self {
        Self {
            bare_name: name.into(),
            replica: Some(index),
        }
    }

    /// Parse a raw identity string as it appears in `InvokeNext` or in a
    /// `Successfully invoked: ...` log line: `name` or `name(k)`.
    pub fn parse(raw: &str) -> Self {
        if let Some(open) = raw.find('(') {
            if raw.ends_with(')') {
                let name = &raw[..open];
                let idx = &raw[open + 1..raw.len() - 1];
                if let Ok(index) = idx.parse::<u32>() {
                    return Self::replica(name, index);
                }
            }
        }
        Self::bare(raw)
    }

    /// The name that would appear in `InvokeNext` if this identity's action
    /// has `Rank = K`: `name(K)`. Used only at graph-construction time.
    pub fn rank_reference(bare_name: &str, rank: u32) -> String {
        format!("{bare_name}({rank})")
    }

    /// Key suffix used in both the log object key and the completion-marker
    /// key: `name` for `Rank = 1`, `name.k` for replica `k`.
    pub fn key_suffix(&self) -> String {
        match self.replica {
            Some(k) => format!("{}.{}", self.bare_name, k),
            None => self.bare_name.clone(),
        }
    }
}

impl fmt::Display for FunctionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.replica {
            Some(k) => write!(f, "{}({})", self.bare_name, k),
            None => write!(f, "{}", self.bare_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_name() {
        let id = FunctionIdentity::parse("func1");
        assert_eq!(id, FunctionIdentity::bare("func1"));
        assert_eq!(id.to_string(), "func1");
        assert_eq!(id.key_suffix(), "func1");
    }

    #[test]
    fn parses_replica_reference() {
        let id = FunctionIdentity::parse("func2(3)");
        assert_eq!(id, FunctionIdentity::replica("func2", 3));
        assert_eq!(id.to_string(), "func2(3)");
        assert_eq!(id.key_suffix(), "func2.3");
    }

    #[test]
    fn rejects_non_numeric_parens_as_bare_name() {
        // Not a rank reference -- treat the whole thing as a literal name.
        let id = FunctionIdentity::parse("weird(name)");
        assert_eq!(id, FunctionIdentity::bare("weird(name)"));
    }
}
