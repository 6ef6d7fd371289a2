use crate::domain::webhook::EntityMatch;

/// Per-message classification derived from the NLP annotation. Never stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Intent {
    pub asset_type: Option<EntityMatch>,
    pub wants_price: Option<EntityMatch>,
}

impl Intent {
    pub fn is_empty(&self) -> bool {
        self.asset_type.is_none() && self.wants_price.is_none()
    }
}
