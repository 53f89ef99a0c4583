/// The identity a command runs as.
///
/// Built once from the config at startup and passed by `&mut` into the
/// router; `register` and `login` are the only commands that change it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    current_user: Option<String>,
}

impl Session {
    pub fn new(current_user: Option<String>) -> Self {
        Self {
            current_user: current_user.filter(|name| !name.is_empty()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn set_user(&mut self, name: impl Into<String>) {
        self.current_user = Some(name.into());
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.current_user() == Some(name)
    }
}
