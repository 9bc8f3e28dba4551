use uuid::Uuid;

use super::token::Identity;

/// Anything with an owning user.
pub trait Ownable {
    fn owner_id(&self) -> Option<Uuid>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Allow iff `resource` is owned by `identity`. Ownerless resources are denied.
pub fn authorize<R: Ownable + ?Sized>(identity: &Identity, resource: &R) -> Decision {
    match resource.owner_id() {
        Some(owner) if owner == identity.user_id => Decision::Allow,
        _ => Decision::Deny,
    }
}
