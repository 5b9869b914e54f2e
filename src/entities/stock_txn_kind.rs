use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of quantity-affecting event recorded against a stock row.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TxnKind {
    #[sea_orm(string_value = "ADD")]
    Add,
    #[sea_orm(string_value = "IN")]
    In,
    #[sea_orm(string_value = "RESERVE")]
    Reserve,
    #[sea_orm(string_value = "OUT")]
    Out,
    #[sea_orm(string_value = "SHIP")]
    Ship,
    #[sea_orm(string_value = "RELEASE")]
    Release,
    #[sea_orm(string_value = "ADJUST")]
    Adjust,
}

impl TxnKind {
    /// Effect of a recorded txn quantity on the row's quantity.
    ///
    /// ADJUST rows store the signed delta; every other kind stores a positive
    /// magnitude whose sign is implied by the kind.
    pub fn signed_delta(self, quantity: i32) -> i32 {
        match self {
            TxnKind::Add | TxnKind::In | TxnKind::Release | TxnKind::Adjust => quantity,
            TxnKind::Reserve | TxnKind::Out | TxnKind::Ship => -quantity,
        }
    }

    pub fn is_adjustment(self) -> bool {
        self == TxnKind::Adjust
    }
}
