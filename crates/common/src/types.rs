use serde::{Deserialize, Serialize};

/// Kind of conversation a message arrived in.
///
/// Direct conversations get verbose feedback; shared ones (groups, channels)
/// only get generic messages so internal failure text never leaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    Dm,
    Group,
    Channel,
}

impl ChatType {
    /// Whether more than one person can read replies in this chat.
    #[must_use]
    pub fn is_shared(self) -> bool {
        !matches!(self, Self::Dm)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dm => "dm",
            Self::Group => "group",
            Self::Channel => "channel",
        }
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
