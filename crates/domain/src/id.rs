//! Typed identifier newtypes backed by configuration strings.
//!
//! Rooms, actors and entities are named by the operator (`living`,
//! `climate.living`, `sensor.outdoor_temperature`), so identifiers wrap the
//! configured string rather than a generated value.

use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a configured identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::new(s))
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

define_id!(
    /// Identifier of a [`Room`](crate::room::Room).
    RoomId
);

define_id!(
    /// Identifier of an [`Actor`](crate::actor::Actor), i.e. one physical device.
    ActorId
);

define_id!(
    /// Identifier of an entity in the platform's state store.
    EntityId
);

impl From<ActorId> for EntityId {
    fn from(value: ActorId) -> Self {
        Self(value.0)
    }
}
