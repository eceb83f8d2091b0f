/// A boolean flag that may also be left unset, so "not specified" can be
/// told apart from an explicit `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionalBool {
    #[default]
    Unset,
    True,
    False,
}

impl OptionalBool {
    pub fn is_set(self) -> bool {
        !matches!(self, OptionalBool::Unset)
    }

    pub fn to_option(self) -> Option<bool> {
        match self {
            OptionalBool::Unset => None,
            OptionalBool::True => Some(true),
            OptionalBool::False => Some(false),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            OptionalBool::Unset => OptionalBool::Unset,
            OptionalBool::True => OptionalBool::False,
            OptionalBool::False => OptionalBool::True,
        }
    }
}

impl From<Option<bool>> for OptionalBool {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => OptionalBool::Unset,
            Some(true) => OptionalBool::True,
            Some(false) => OptionalBool::False,
        }
    }
}

impl From<bool> for OptionalBool {
    fn from(value: bool) -> Self {
        Some(value).into()
    }
}

/// Per-invocation settings shared by every registry operation.
#[derive(Debug, Clone, Default)]
pub struct SystemContext {
    /// Skip TLS verification when talking to a registry. Local credential
    /// mutations do not consult it; transports do.
    pub insecure_skip_tls_verify: OptionalBool,
}

impl SystemContext {
    /// Build a context from the `--tls-verify` flag, which is the negation
    /// of "skip verification".
    pub fn with_tls_verify(tls_verify: OptionalBool) -> Self {
        Self {
            insecure_skip_tls_verify: tls_verify.negate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_option() {
        assert_eq!(OptionalBool::from(None), OptionalBool::Unset);
        assert_eq!(OptionalBool::from(Some(true)), OptionalBool::True);
        assert_eq!(OptionalBool::from(false), OptionalBool::False);
        assert!(!OptionalBool::Unset.is_set());
        assert_eq!(OptionalBool::True.to_option(), Some(true));
    }

    #[test]
    fn test_tls_verify_negation() {
        let ctx = SystemContext::with_tls_verify(OptionalBool::False);
        assert_eq!(ctx.insecure_skip_tls_verify, OptionalBool::True);

        let ctx = SystemContext::with_tls_verify(OptionalBool::Unset);
        assert_eq!(ctx.insecure_skip_tls_verify, OptionalBool::Unset);
    }
}
