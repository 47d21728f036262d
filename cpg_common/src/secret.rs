use std::{
    fmt,
    fmt::{Debug, Display},
};

/// A configuration value that must never appear in logs.
///
/// The wrapped value is only reachable through [`Secret::reveal`], so a stray `{:?}` or `{}` on a config
/// struct prints `****` instead of the signing key.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// Deliberately loud at the call site. Grep for `reveal` to audit every place the secret escapes.
    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl Secret<String> {
    /// The secret as raw key material, for handing to a MAC.
    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secrets_are_redacted_in_formatting() {
        let secret = Secret::new("hunter2".to_string());
        assert_eq!(format!("{secret}"), "****");
        assert_eq!(format!("{secret:?}"), "****");
        assert_eq!(secret.reveal(), "hunter2");
        assert_eq!(secret.as_bytes(), b"hunter2");
    }
}
