/// Shared error flag carried by context blocks.
///
/// Recoverable failures raise the flag instead of returning an error, so
/// downstream tasks in the same tick can see it and skip.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FaultFlag {
    reason: Option<String>,
}

impl FaultFlag {
    /// Keeps the first reason; later raises only log.
    pub fn raise(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        match &self.reason {
            Some(first) => log::debug!("fault already raised ({first}); ignoring: {reason}"),
            None => {
                log::warn!("fault raised: {reason}");
                self.reason = Some(reason);
            }
        }
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.reason.is_some()
    }

    #[inline]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[inline]
    pub fn clear(&mut self) -> Option<String> {
        self.reason.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins_until_cleared() {
        let mut f = FaultFlag::default();
        assert!(!f.is_raised());

        f.raise("surface lost");
        f.raise("second");
        assert_eq!(f.reason(), Some("surface lost"));

        assert_eq!(f.clear().as_deref(), Some("surface lost"));
        assert!(!f.is_raised());
    }
}
