use std::fmt;
use std::str::FromStr;

use crate::error::StanzaError;

/// Namespace carried by configuration nodes of management messages.
pub const CONFIGURATION_NS: &str = "jabber:iq:configuration";

/// Child element names a management message may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagementTag {
    Room,
    UserSettings,
    UserInvite,
    Group,
    Conversation,
    Mute,
    Unmute,
    File,
    Thumbnail,
    Channel,
}

impl ManagementTag {
    pub const ALL: [ManagementTag; 10] = [
        Self::Room,
        Self::UserSettings,
        Self::UserInvite,
        Self::Group,
        Self::Conversation,
        Self::Mute,
        Self::Unmute,
        Self::File,
        Self::Thumbnail,
        Self::Channel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::UserSettings => "usersettings",
            Self::UserInvite => "userinvite",
            Self::Group => "group",
            Self::Conversation => "conversation",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::File => "file",
            Self::Thumbnail => "thumbnail",
            Self::Channel => "channel",
        }
    }
}

impl fmt::Display for ManagementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManagementTag {
    type Err = StanzaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| StanzaError::Unsupported {
                name: s.to_string(),
                kind: Some("management".to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_parses_back() {
        for tag in ManagementTag::ALL {
            assert_eq!(tag.to_string().parse::<ManagementTag>(), Ok(tag));
        }
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        assert!(matches!(
            "foo".parse::<ManagementTag>(),
            Err(StanzaError::Unsupported { name, .. }) if name == "foo"
        ));
        assert!("Channel".parse::<ManagementTag>().is_err());
    }
}
