use folio_core::UserId;

/// Caller identity for a request, as asserted by the identity collaborator.
///
/// Present on every route behind the identity middleware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
