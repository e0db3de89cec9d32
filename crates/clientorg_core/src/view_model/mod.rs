//! Detail view models: edit lifecycle of one entity.

pub mod client_detail;
pub mod detail;

pub use client_detail::{ClientDetail, ClientDetailViewModel, CLIENT_DETAIL_VIEW_MODEL};
pub use detail::{
    CloseOutcome, DeleteOutcome, DetailBehavior, DetailError, DetailResult, DetailState,
    DetailStatus, DetailViewModel, SaveOutcome,
};
