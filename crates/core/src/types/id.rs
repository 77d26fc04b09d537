//! Newtype IDs for type-safe entity references.
//!
//! Every identifier that flows through the search pipeline (a productId
//! surfacing in a cursor tiebreak, a variantId keying a grouped hit, an
//! offerId inside a buy-box) is wrapped in its own type so a `VariantId`
//! can never be passed where a `ProductId` is expected. All of them are
//! backed by `i64`, matching the relational catalog's primary keys.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new identifier from its raw integer value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying `i64` value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
            }
        }
    };
}

define_id!(ProductId);
define_id!(VariantId);
define_id!(OfferId);
define_id!(SupplierId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_i64() {
        let id = ProductId::new(42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(ProductId::from(42i64), id);
    }

    #[test]
    fn orders_by_underlying_value() {
        assert!(ProductId::new(1) < ProductId::new(2));
    }

    #[test]
    fn serializes_as_a_bare_number() {
        let id = VariantId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }
}
