use serde::{Deserialize, Serialize};

/// Authentication status reported by the launcher daemon. `Unknown` is the
/// only value before the first authoritative report arrives; recovery from
/// `Error` is driven externally, this slice just reflects what it is told.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginState {
    #[default]
    Unknown,
    LoggedOut,
    LoggedIn,
    MultifactorRequired,
    Error,
}

impl LoginState {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginState::Unknown => "UNKNOWN",
            LoginState::LoggedOut => "LOGGED_OUT",
            LoginState::LoggedIn => "LOGGED_IN",
            LoginState::MultifactorRequired => "MULTIFACTOR_REQUIRED",
            LoginState::Error => "ERROR",
        }
    }
}
