use serde::{Deserialize, Serialize};

/// Discord snowflake id newtypes. Snowflakes are 64-bit and sort by
/// creation time, so `Ord` on the wrapped integer gives a stable order.
macro_rules! snowflake {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse::<u64>().map(Self)
            }
        }
    };
}

snowflake!(
    /// A guild (server) id.
    GuildId
);
snowflake!(
    /// A text channel id.
    ChannelId
);
snowflake!(
    /// A message id.
    MessageId
);
snowflake!(
    /// A user id.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_parse_and_display() {
        let id: ChannelId = "123456789012345678".parse().unwrap();
        assert_eq!(id, ChannelId(123456789012345678));
        assert_eq!(id.to_string(), "123456789012345678");
    }

    #[test]
    fn snowflake_serde_transparent() {
        let id = GuildId(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let back: GuildId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
