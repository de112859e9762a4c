use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::transactions::filter::Pagination;
use crate::transactions::repo_types::{
    Currency, NewTransaction, Party, PartyType, PaymentMethod, Summary, Transaction,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    pub receiver_type: PartyType,
    #[validate(length(min = 1, message = "receiver_name is required"))]
    pub receiver_name: String,
    pub receiver_id: Option<String>,
    pub payer_type: PartyType,
    #[validate(length(min = 1, message = "payer_name is required"))]
    pub payer_name: String,
    pub payer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    #[validate(range(exclusive_min = 0.0, message = "amount must be greater than 0"))]
    pub amount: f64,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "datetime_iso is required"))]
    pub datetime_iso: String,
    #[validate(length(min = 1, message = "timezone is required"))]
    pub timezone: String,
}

impl CreateTransactionRequest {
    /// Re-projects the submitted instant to UTC and attaches the owner.
    pub fn into_new(self, creator: Uuid) -> Result<NewTransaction> {
        let datetime_utc = OffsetDateTime::parse(&self.datetime_iso, &Rfc3339)
            .map_err(|_| AppError::invalid_request("datetime_iso must be RFC3339"))?
            .to_offset(UtcOffset::UTC);

        Ok(NewTransaction {
            created_by_user_id: creator,
            receiver: Party {
                kind: self.receiver_type,
                name: self.receiver_name,
                id: self.receiver_id,
            },
            payer: Party {
                kind: self.payer_type,
                name: self.payer_name,
                id: self.payer_id,
            },
            payment_method: self.payment_method,
            currency: self.currency,
            amount: self.amount,
            description: self.description,
            datetime_utc,
            timezone: self.timezone,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: Uuid,
    pub created_by_user_id: Uuid,
    pub receiver_type: PartyType,
    pub receiver_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    pub payer_type: PartyType,
    pub payer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub datetime_iso: OffsetDateTime,
    pub timezone: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            created_by_user_id: tx.created_by_user_id,
            receiver_type: tx.receiver.kind,
            receiver_name: tx.receiver.name,
            receiver_id: tx.receiver.id,
            payer_type: tx.payer.kind,
            payer_name: tx.payer.name,
            payer_id: tx.payer.id,
            payment_method: tx.payment_method,
            currency: tx.currency,
            amount: tx.amount,
            description: tx.description,
            datetime_iso: tx.datetime_utc.to_offset(UtcOffset::UTC),
            timezone: tx.timezone,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionList {
    pub data: Vec<TransactionView>,
    pub meta: Pagination,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Kpis {
    pub total_amount: f64,
    pub avg_amount: f64,
    pub count: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MonthlyAmount {
    pub month: String,
    pub amount: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CurrencyShare {
    pub currency: String,
    pub amount: f64,
    /// 0..100 share of `total_amount`.
    pub percent: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SummaryView {
    pub kpis: Kpis,
    pub monthly: Vec<MonthlyAmount>,
    pub by_currency: Vec<CurrencyShare>,
}

impl From<Summary> for SummaryView {
    fn from(summary: Summary) -> Self {
        let monthly = (1..=12)
            .map(|m| {
                let month = format!("{m:02}");
                let amount = summary
                    .monthly
                    .iter()
                    .filter(|(label, _)| *label == month)
                    .map(|(_, amount)| amount)
                    .sum::<f64>();
                MonthlyAmount { month, amount }
            })
            .collect();

        let total = summary.total_amount;
        let by_currency = summary
            .by_currency
            .into_iter()
            .map(|(currency, amount)| CurrencyShare {
                currency,
                amount,
                percent: if total > 0.0 {
                    amount / total * 100.0
                } else {
                    0.0
                },
            })
            .collect();

        Self {
            kpis: Kpis {
                total_amount: summary.total_amount,
                avg_amount: summary.avg_amount,
                count: summary.count,
            },
            monthly,
            by_currency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn request(datetime_iso: &str, amount: f64) -> CreateTransactionRequest {
        serde_json::from_value(serde_json::json!({
            "receiver_type": "individual",
            "receiver_name": "Ali",
            "payer_type": "legal",
            "payer_name": "Acme",
            "payment_method": "cash",
            "currency": "USD",
            "amount": amount,
            "datetime_iso": datetime_iso,
            "timezone": "Asia/Tehran",
        }))
        .unwrap()
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(request("2024-06-15T10:00:00Z", 0.0).validate().is_err());
        assert!(request("2024-06-15T10:00:00Z", -3.0).validate().is_err());
        assert!(request("2024-06-15T10:00:00Z", 0.01).validate().is_ok());
    }

    #[test]
    fn unknown_enum_token_fails_to_decode() {
        let result = serde_json::from_value::<CreateTransactionRequest>(serde_json::json!({
            "receiver_type": "company",
            "receiver_name": "Ali",
            "payer_type": "legal",
            "payer_name": "Acme",
            "payment_method": "cash",
            "currency": "USD",
            "amount": 1.0,
            "datetime_iso": "2024-06-15T10:00:00Z",
            "timezone": "UTC",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn offset_instants_are_stored_as_utc() {
        let new = request("2024-06-15T13:30:00+03:30", 5.0)
            .into_new(Uuid::new_v4())
            .unwrap();
        assert_eq!(new.datetime_utc, datetime!(2024-06-15 10:00 UTC));
        assert_eq!(new.datetime_utc.offset(), UtcOffset::UTC);
        assert_eq!(new.timezone, "Asia/Tehran");
    }

    #[test]
    fn non_rfc3339_datetime_is_rejected() {
        let err = request("15/06/2024 10:00", 5.0)
            .into_new(Uuid::new_v4())
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn summary_fills_all_twelve_months() {
        let view = SummaryView::from(Summary {
            total_amount: 300.0,
            avg_amount: 100.0,
            count: 3,
            monthly: vec![("02".into(), 100.0), ("11".into(), 200.0)],
            by_currency: vec![("USD".into(), 225.0), ("EUR".into(), 75.0)],
        });

        let labels: Vec<&str> = view.monthly.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(
            labels,
            ["01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12"]
        );
        assert_eq!(view.monthly[1].amount, 100.0);
        assert_eq!(view.monthly[10].amount, 200.0);
        assert_eq!(view.monthly[0].amount, 0.0);

        let percents: f64 = view.by_currency.iter().map(|c| c.percent).sum();
        assert!((percents - 100.0).abs() < 1e-9);
        assert_eq!(view.by_currency[0].percent, 75.0);
    }

    #[test]
    fn empty_summary_has_zero_percents() {
        let view = SummaryView::from(Summary::default());
        assert_eq!(view.kpis.count, 0);
        assert_eq!(view.monthly.len(), 12);
        assert!(view.by_currency.is_empty());
    }

    #[test]
    fn view_omits_absent_optionals() {
        let tx = Transaction {
            id: Uuid::new_v4(),
            created_by_user_id: Uuid::new_v4(),
            receiver: Party {
                kind: PartyType::Individual,
                name: "Ali".into(),
                id: None,
            },
            payer: Party {
                kind: PartyType::Legal,
                name: "Acme".into(),
                id: Some("10101".into()),
            },
            payment_method: PaymentMethod::Account,
            currency: Currency::Eur,
            amount: 12.5,
            description: None,
            datetime_utc: datetime!(2024-06-15 10:00 UTC),
            timezone: "Europe/Berlin".into(),
            created_at: datetime!(2024-06-15 10:01 UTC),
            updated_at: datetime!(2024-06-15 10:01 UTC),
        };
        let json = serde_json::to_value(TransactionView::from(tx)).unwrap();
        assert!(json.get("receiver_id").is_none());
        assert!(json.get("description").is_none());
        assert_eq!(json["payer_id"], "10101");
        assert_eq!(json["currency"], "EUR");
        assert_eq!(json["datetime_iso"], "2024-06-15T10:00:00Z");
    }
}
