use std::fmt::Debug;

/// The credentials sent as HTTP basic authentication with every request.
///
/// # Example
///
/// ```
/// use sluice::BasicAuth;
///
/// let auth = BasicAuth::new("root", Some("my_password"));
/// assert_eq!("root", auth.user());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    user: String,
    password: Option<String>,
}

impl BasicAuth {
    /// Creates the credentials from a user name and an optional password.
    pub fn new(user: impl ToString, password: Option<impl ToString>) -> Self {
        Self {
            user: user.to_string(),
            password: password.map(|p| p.to_string()),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<HIDDEN>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth() {
        let auth = BasicAuth::new("user", Some("pass"));
        assert_eq!("user", auth.user());
        assert_eq!(Some("pass"), auth.password());

        let auth = BasicAuth::new("user", None::<&str>);
        assert_eq!(None, auth.password());
    }

    #[test]
    fn debug_hides_password() {
        let auth = BasicAuth::new("sa", Some("secret"));
        let dbg = format!("{:?}", auth);
        assert!(dbg.contains("sa"));
        assert!(dbg.contains("<HIDDEN>"));
        assert!(!dbg.contains("secret"));
    }

    #[test]
    fn clone_eq() {
        let a1 = BasicAuth::new("u", Some("p"));
        let a2 = a1.clone();
        assert_eq!(a1, a2);
    }
}
