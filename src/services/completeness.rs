//! Presence Checker
//!
//! Computes which of a status's required documents and fields an order is
//! still missing. The evaluation itself is pure ([`evaluate`]); the async
//! wrapper only loads the attached document kinds.

use std::collections::{BTreeSet, HashSet};

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::requirements::{requirements_for, OrderField, StatusRequirements};
use crate::entities::order::{self, OrderStatus};
use crate::entities::order_media::{self, DocumentKind};
use crate::errors::ServiceError;

/// Pairs of document kind and order field that record the same fact.
///
/// Either side satisfies a requirement for the other.
pub const EQUIVALENCES: &[(DocumentKind, OrderField)] =
    &[(DocumentKind::ProofOfPayment, OrderField::PaymentProof)];

/// What an order has on hand, as seen by the checker.
#[derive(Debug, Clone, Default)]
pub struct OrderSnapshot {
    pub present_fields: HashSet<OrderField>,
    pub documents: BTreeSet<DocumentKind>,
}

impl OrderSnapshot {
    pub fn from_order(order: &order::Model, documents: impl IntoIterator<Item = DocumentKind>) -> Self {
        use strum::IntoEnumIterator;

        Self {
            present_fields: OrderField::iter().filter(|f| f.is_present(order)).collect(),
            documents: documents.into_iter().collect(),
        }
    }

    fn has_document(&self, kind: DocumentKind) -> bool {
        self.documents.contains(&kind)
            || EQUIVALENCES
                .iter()
                .any(|(doc, field)| *doc == kind && self.present_fields.contains(field))
    }

    fn has_field(&self, field: OrderField) -> bool {
        self.present_fields.contains(&field)
            || EQUIVALENCES
                .iter()
                .any(|(doc, f)| *f == field && self.documents.contains(doc))
    }
}

/// Outcome of checking one order against one target status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequirementReport {
    pub order_id: Uuid,
    pub target_status: OrderStatus,
    pub missing_docs: Vec<DocumentKind>,
    pub missing_fields: Vec<OrderField>,
    pub satisfied_docs: Vec<DocumentKind>,
    pub satisfied_fields: Vec<OrderField>,
}

impl RequirementReport {
    pub fn is_satisfied(&self) -> bool {
        self.missing_docs.is_empty() && self.missing_fields.is_empty()
    }

    /// One-line description of the gaps, for logs and error messages.
    pub fn summary(&self) -> String {
        let join = |items: Vec<String>| items.join(", ");
        match (self.missing_docs.is_empty(), self.missing_fields.is_empty()) {
            (true, true) => "all requirements satisfied".to_string(),
            (false, true) => format!(
                "missing documents [{}]",
                join(self.missing_docs.iter().map(|d| d.to_string()).collect())
            ),
            (true, false) => format!(
                "missing fields [{}]",
                join(self.missing_fields.iter().map(|f| f.to_string()).collect())
            ),
            (false, false) => format!(
                "missing documents [{}]; missing fields [{}]",
                join(self.missing_docs.iter().map(|d| d.to_string()).collect()),
                join(self.missing_fields.iter().map(|f| f.to_string()).collect())
            ),
        }
    }
}

/// Splits `requirements` into missing and satisfied, preserving declaration order.
pub fn evaluate(
    order_id: Uuid,
    target_status: OrderStatus,
    requirements: &StatusRequirements,
    snapshot: &OrderSnapshot,
) -> RequirementReport {
    let (satisfied_docs, missing_docs): (Vec<_>, Vec<_>) = requirements
        .documents
        .iter()
        .copied()
        .partition(|kind| snapshot.has_document(*kind));
    let (satisfied_fields, missing_fields): (Vec<_>, Vec<_>) = requirements
        .fields
        .iter()
        .copied()
        .partition(|field| snapshot.has_field(*field));

    RequirementReport {
        order_id,
        target_status,
        missing_docs,
        missing_fields,
        satisfied_docs,
        satisfied_fields,
    }
}

/// Distinct document kinds attached to an order.
pub async fn attached_document_kinds<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<BTreeSet<DocumentKind>, ServiceError> {
    let kinds: Vec<DocumentKind> = order_media::Entity::find()
        .select_only()
        .column(order_media::Column::DocType)
        .distinct()
        .filter(order_media::Column::OrderId.eq(order_id))
        .into_tuple()
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(kinds.into_iter().collect())
}

/// Checks `order` against the requirements of `target_status`.
///
/// Statuses without requirements are answered without touching the database.
pub async fn check_requirements<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
    target_status: OrderStatus,
) -> Result<RequirementReport, ServiceError> {
    let requirements = requirements_for(target_status);
    if requirements.is_empty() {
        return Ok(evaluate(
            order.id,
            target_status,
            &requirements,
            &OrderSnapshot::default(),
        ));
    }

    let documents = attached_document_kinds(conn, order.id).await?;
    let snapshot = OrderSnapshot::from_order(order, documents);
    let report = evaluate(order.id, target_status, &requirements, &snapshot);
    debug!(
        order_id = %order.id,
        target = %target_status,
        satisfied = report.is_satisfied(),
        "Evaluated status requirements"
    );
    Ok(report)
}
