use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::StoreError;

#[derive(Debug, Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Declares a closed set of lowercase/uppercase tokens stored as TEXT.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $token:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $token)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($token => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(PartyType, "party type", {
    Individual => "individual",
    Legal => "legal",
});

text_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    Account => "account",
});

text_enum!(Currency, "currency", {
    Irr => "IRR",
    Irt => "IRT",
    Usd => "USD",
    Eur => "EUR",
    Aed => "AED",
    Try => "TRY",
});

/// Row of the `transactions` table.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub created_by_user_id: Uuid,
    pub receiver_type: String,
    pub receiver_name: String,
    pub receiver_id: Option<String>,
    pub payer_type: String,
    pub payer_name: String,
    pub payer_id: Option<String>,
    pub payment_method: String,
    pub currency: String,
    pub amount: f64,
    pub description: Option<String>,
    pub datetime_utc: OffsetDateTime,
    pub timezone: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Party {
    pub kind: PartyType,
    pub name: String,
    pub id: Option<String>,
}

/// Recorded money movement owned by `created_by_user_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub created_by_user_id: Uuid,
    pub receiver: Party,
    pub payer: Party,
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    pub amount: f64,
    pub description: Option<String>,
    /// Always UTC.
    pub datetime_utc: OffsetDateTime,
    /// IANA zone the client submitted, kept verbatim.
    pub timezone: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let decode = |e: UnknownVariant| StoreError::Database(sqlx::Error::Decode(Box::new(e)));
        Ok(Self {
            id: row.id,
            created_by_user_id: row.created_by_user_id,
            receiver: Party {
                kind: row.receiver_type.parse().map_err(decode)?,
                name: row.receiver_name,
                id: row.receiver_id,
            },
            payer: Party {
                kind: row.payer_type.parse().map_err(decode)?,
                name: row.payer_name,
                id: row.payer_id,
            },
            payment_method: row.payment_method.parse().map_err(decode)?,
            currency: row.currency.parse().map_err(decode)?,
            amount: row.amount,
            description: row.description,
            datetime_utc: row.datetime_utc,
            timezone: row.timezone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Validated input for an insert; ids and audit stamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub created_by_user_id: Uuid,
    pub receiver: Party,
    pub payer: Party,
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    pub amount: f64,
    pub description: Option<String>,
    pub datetime_utc: OffsetDateTime,
    pub timezone: String,
}

/// Aggregates over one filtered set. Absent months and currencies had no rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub total_amount: f64,
    pub avg_amount: f64,
    pub count: i64,
    /// Keyed by two-digit month label `01..12`.
    pub monthly: Vec<(String, f64)>,
    pub by_currency: Vec<(String, f64)>,
}
