//! Requirements Resolver
//!
//! Static mapping from a target [`OrderStatus`] to the document kinds and
//! scalar order fields that must be present before an order may move there.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::order::{self, OrderStatus};
use crate::entities::order_media::DocumentKind;

/// Scalar order attribute that can be required by a status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderField {
    DeliveryAddress,
    PaymentProof,
    SerialNumber,
    RequestedShipDate,
    PriorityRank,
}

impl OrderField {
    /// Current value of the field on `order`, rendered as text.
    pub fn value(self, order: &order::Model) -> Option<String> {
        match self {
            OrderField::DeliveryAddress => Some(order.delivery_address.clone()),
            OrderField::PaymentProof => order.payment_proof_url.clone(),
            OrderField::SerialNumber => order.serial_number.clone(),
            OrderField::RequestedShipDate => order.requested_ship_date.map(|d| d.to_string()),
            OrderField::PriorityRank => order.priority_rank.map(|r| r.to_string()),
        }
    }

    /// A field counts as present when it holds something other than whitespace.
    pub fn is_present(self, order: &order::Model) -> bool {
        self.value(order)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Documents and fields gating entry into one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusRequirements {
    #[schema(value_type = Vec<DocumentKind>)]
    pub documents: &'static [DocumentKind],
    #[schema(value_type = Vec<OrderField>)]
    pub fields: &'static [OrderField],
}

impl StatusRequirements {
    pub const NONE: StatusRequirements = StatusRequirements {
        documents: &[],
        fields: &[],
    };

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.fields.is_empty()
    }
}

/// Requirements for entering `status`.
pub fn requirements_for(status: OrderStatus) -> StatusRequirements {
    use DocumentKind as D;
    use OrderField as F;

    match status {
        OrderStatus::Submitted | OrderStatus::Canceled => StatusRequirements::NONE,
        OrderStatus::Approved => StatusRequirements {
            documents: &[D::ProofOfPayment, D::Quote],
            fields: &[],
        },
        OrderStatus::Scheduled => StatusRequirements {
            documents: &[D::SignedOrderForm],
            fields: &[F::RequestedShipDate, F::PriorityRank],
        },
        OrderStatus::InProduction => StatusRequirements {
            documents: &[D::BuildSheet],
            fields: &[],
        },
        OrderStatus::ReadyToShip => StatusRequirements {
            documents: &[D::QualityInspection],
            fields: &[F::SerialNumber],
        },
        OrderStatus::Shipped => StatusRequirements {
            documents: &[D::BillOfLading],
            fields: &[F::DeliveryAddress, F::SerialNumber],
        },
        OrderStatus::Delivered => StatusRequirements {
            documents: &[D::DeliveryReceipt],
            fields: &[],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rstest::rstest;
    use sea_orm::prelude::Json;
    use uuid::Uuid;

    fn sample_order() -> order::Model {
        order::Model {
            id: Uuid::new_v4(),
            order_number: "ORD-1".into(),
            dealer_id: Uuid::new_v4(),
            model_id: Uuid::new_v4(),
            color_id: Uuid::new_v4(),
            factory_id: Uuid::new_v4(),
            status: OrderStatus::Submitted,
            delivery_address: "12 Harbor Rd".into(),
            payment_proof_url: None,
            serial_number: Some("   ".into()),
            requested_ship_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            priority_rank: None,
            hardware_options: Json::Array(vec![]),
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn free_form_attachments_never_gate() {
        for status in [
            OrderStatus::Submitted,
            OrderStatus::Approved,
            OrderStatus::Scheduled,
            OrderStatus::InProduction,
            OrderStatus::ReadyToShip,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Canceled,
        ] {
            assert!(!requirements_for(status).documents.contains(&DocumentKind::Other));
        }
    }

    #[rstest]
    #[case(OrderStatus::Approved, &[DocumentKind::ProofOfPayment, DocumentKind::Quote], &[])]
    #[case(OrderStatus::Scheduled, &[DocumentKind::SignedOrderForm], &[OrderField::RequestedShipDate, OrderField::PriorityRank])]
    #[case(OrderStatus::InProduction, &[DocumentKind::BuildSheet], &[])]
    #[case(OrderStatus::ReadyToShip, &[DocumentKind::QualityInspection], &[OrderField::SerialNumber])]
    #[case(OrderStatus::Shipped, &[DocumentKind::BillOfLading], &[OrderField::DeliveryAddress, OrderField::SerialNumber])]
    #[case(OrderStatus::Delivered, &[DocumentKind::DeliveryReceipt], &[])]
    fn gated_statuses_declare_requirements(
        #[case] status: OrderStatus,
        #[case] documents: &[DocumentKind],
        #[case] fields: &[OrderField],
    ) {
        let reqs = requirements_for(status);
        assert_eq!(reqs.documents, documents);
        assert_eq!(reqs.fields, fields);
        assert!(!reqs.is_empty());
    }

    #[rstest]
    #[case(OrderStatus::Submitted)]
    #[case(OrderStatus::Canceled)]
    fn ungated_statuses_are_empty(#[case] status: OrderStatus) {
        assert!(requirements_for(status).is_empty());
    }

    #[test]
    fn whitespace_is_not_a_value() {
        let order = sample_order();
        assert!(OrderField::DeliveryAddress.is_present(&order));
        assert!(!OrderField::SerialNumber.is_present(&order));
        assert!(!OrderField::PaymentProof.is_present(&order));
        assert!(OrderField::RequestedShipDate.is_present(&order));
        assert!(!OrderField::PriorityRank.is_present(&order));
    }

    #[test]
    fn ship_date_renders_iso() {
        let order = sample_order();
        assert_eq!(
            OrderField::RequestedShipDate.value(&order).as_deref(),
            Some("2025-03-01")
        );
    }
}
