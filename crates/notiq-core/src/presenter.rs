//! Presentation surface trait. Enables mock injection for testing.

use crate::error::PresentError;
use crate::types::QueueItem;

/// Puts an item on screen.
///
/// Must return promptly. For a modal presentation the surface reports the
/// user closing it by calling `dismiss_modal` on the arbiter; `present`
/// itself must not wait for that.
pub trait Presenter: Send + Sync {
    fn present(&self, item: &QueueItem, modal: bool) -> Result<(), PresentError>;
}

impl<T: Presenter + ?Sized> Presenter for &T {
    fn present(&self, item: &QueueItem, modal: bool) -> Result<(), PresentError> {
        (**self).present(item, modal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Payload};
    use chrono::Utc;

    #[test]
    fn blanket_ref_impl() {
        struct Refuse;
        impl Presenter for Refuse {
            fn present(&self, _item: &QueueItem, _modal: bool) -> Result<(), PresentError> {
                Err(PresentError::Unavailable)
            }
        }
        let p = Refuse;
        let r: &Refuse = &p;
        let item = QueueItem::new(1, Payload::Message(Message::new("x")), false, Utc::now());
        assert!(matches!(
            r.present(&item, false),
            Err(PresentError::Unavailable)
        ));
    }
}
