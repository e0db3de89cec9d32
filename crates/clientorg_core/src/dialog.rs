//! User confirmation seam for detail views.
//!
//! The presentation layer supplies the implementation; the core only decides
//! when to ask and what the answer means.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDialogResult {
    Ok,
    Cancel,
}

#[async_trait]
pub trait MessageDialogService: Send + Sync {
    /// Shows an informational message and waits until it is acknowledged.
    async fn show_info(&self, message: &str);

    /// Asks an Ok/Cancel question.
    async fn show_ok_cancel(&self, message: &str, title: &str) -> MessageDialogResult;
}
