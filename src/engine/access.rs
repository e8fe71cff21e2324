//! Declarative per-role authorization.
//!
//! Every CRUD operation of a table carries its own pragma. Single-record
//! operations use a three-tier [`Permission`]:
//!
//! 1. `unauthorized` roles are rejected outright, before anything else,
//! 2. `unconditional` roles are admitted without looking at the record,
//! 3. everyone else is handed to the `conditional` predicate, if any.
//!
//! When nothing matches the answer is a denial.

use crate::core::{Actor, Role};
use std::fmt;

/// The CRUD operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crud {
    Creation,
    Read,
    Modification,
    Deletion,
    Seeding,
}

impl Crud {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Read => "read",
            Self::Modification => "modification",
            Self::Deletion => "deletion",
            Self::Seeding => "seeding",
        }
    }

    /// Generic denial used when a role lacks the required tier.
    pub fn elevation_message(&self) -> String {
        format!("{self} requires an elevated permission level")
    }
}

impl fmt::Display for Crud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a per-record access predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub success: bool,
    pub message: String,
}

impl Authorization {
    pub fn allow() -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Per-record predicate: `(record, actor) -> Authorization`.
pub type ConditionalAccess<R> = fn(&R, &Actor) -> Authorization;

/// Outcome of evaluating a pragma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Denied; the message is safe to return to the caller.
    Deny(String),
    /// The role is on the table's explicit deny-list.
    Forbidden,
    /// No actor was supplied.
    Unauthenticated,
    /// Only a conditional rule can decide; the record has to be fetched first.
    NeedsRecord,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Three-tier permission for a single-record operation.
pub struct Permission<R> {
    pub unauthorized: Vec<Role>,
    pub unconditional: Vec<Role>,
    pub conditional: Option<ConditionalAccess<R>>,
}

impl<R> Default for Permission<R> {
    fn default() -> Self {
        Self {
            unauthorized: Vec::new(),
            unconditional: Vec::new(),
            conditional: None,
        }
    }
}

impl<R> Clone for Permission<R> {
    fn clone(&self) -> Self {
        Self {
            unauthorized: self.unauthorized.clone(),
            unconditional: self.unconditional.clone(),
            conditional: self.conditional,
        }
    }
}

impl<R> fmt::Debug for Permission<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permission")
            .field("unauthorized", &self.unauthorized)
            .field("unconditional", &self.unconditional)
            .field("conditional", &self.conditional.is_some())
            .finish()
    }
}

impl<R> Permission<R> {
    /// Roles admitted regardless of record contents.
    pub fn unconditional(roles: &[Role]) -> Self {
        Self {
            unconditional: roles.to_vec(),
            ..Self::default()
        }
    }

    pub fn deny_roles(mut self, roles: &[Role]) -> Self {
        self.unauthorized = roles.to_vec();
        self
    }

    pub fn conditional(mut self, check: ConditionalAccess<R>) -> Self {
        self.conditional = Some(check);
        self
    }

    /// Evaluates the tiers that do not need the record.
    ///
    /// Returns `NeedsRecord` when the conditional predicate has to run.
    pub fn screen(&self, actor: Option<&Actor>, op: Crud) -> Decision {
        let Some(actor) = actor else {
            return Decision::Unauthenticated;
        };
        if self.unauthorized.contains(&actor.role) {
            return Decision::Forbidden;
        }
        if self.unconditional.contains(&actor.role) {
            return Decision::Allow;
        }
        if self.conditional.is_some() {
            return Decision::NeedsRecord;
        }
        Decision::Deny(op.elevation_message())
    }

    /// Full evaluation against a fetched record.
    pub fn authorize(&self, actor: Option<&Actor>, record: &R, op: Crud) -> Decision {
        match self.screen(actor, op) {
            Decision::NeedsRecord => {}
            decided => return decided,
        }
        match (self.conditional, actor) {
            (Some(check), Some(actor)) => {
                let verdict = check(record, actor);
                if verdict.success {
                    Decision::Allow
                } else {
                    Decision::Deny(verdict.message)
                }
            }
            _ => Decision::Deny(op.elevation_message()),
        }
    }
}

/// Access pragma of one table. `None` disables a single-record operation;
/// for `read_many` it means "no restriction".
pub struct AccessPragma<R> {
    pub create: Option<Vec<Role>>,
    pub read: Option<Permission<R>>,
    pub read_many: Option<Vec<Role>>,
    pub update: Option<Permission<R>>,
    pub delete: Option<Permission<R>>,
}

impl<R> Default for AccessPragma<R> {
    fn default() -> Self {
        Self {
            create: None,
            read: None,
            read_many: None,
            update: None,
            delete: None,
        }
    }
}

impl<R> fmt::Debug for AccessPragma<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPragma")
            .field("create", &self.create)
            .field("read", &self.read)
            .field("read_many", &self.read_many)
            .field("update", &self.update)
            .field("delete", &self.delete)
            .finish()
    }
}

/// Listing check: absent pragma admits everyone, a role list admits its members.
pub fn authorize_many(actor: Option<&Actor>, roles: Option<&[Role]>) -> bool {
    match roles {
        None => true,
        Some(roles) => actor.is_some_and(|actor| roles.contains(&actor.role)),
    }
}

/// Plain role-list check used by create and seeding.
pub fn authorize_roles(actor: Option<&Actor>, roles: &[Role], op: Crud) -> Decision {
    match actor {
        None => Decision::Unauthenticated,
        Some(actor) if roles.contains(&actor.role) => Decision::Allow,
        Some(_) => Decision::Deny(op.elevation_message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Doc {
        owner: i64,
    }

    fn owner_only(doc: &Doc, actor: &Actor) -> Authorization {
        if doc.owner == actor.id {
            Authorization::allow()
        } else {
            Authorization::deny("not your document")
        }
    }

    const BASIC: Actor = Actor::new(1, Role::BasicUser);
    const ADMIN: Actor = Actor::new(2, Role::AdminUser);
    const SUPER: Actor = Actor::new(3, Role::SuperUser);

    #[test]
    fn test_deny_list_beats_unconditional() {
        let permission: Permission<Doc> = Permission::unconditional(&[Role::SuperUser])
            .deny_roles(&[Role::SuperUser]);
        assert_eq!(
            permission.authorize(Some(&SUPER), &Doc { owner: 3 }, Crud::Deletion),
            Decision::Forbidden
        );
        assert_eq!(permission.screen(Some(&SUPER), Crud::Deletion), Decision::Forbidden);
    }

    #[test]
    fn test_unconditional_skips_predicate() {
        let permission = Permission::unconditional(&[Role::AdminUser]).conditional(owner_only);
        assert_eq!(
            permission.authorize(Some(&ADMIN), &Doc { owner: 99 }, Crud::Read),
            Decision::Allow
        );
    }

    #[test]
    fn test_conditional_message_is_verbatim() {
        let permission = Permission::unconditional(&[Role::SuperUser]).conditional(owner_only);
        assert_eq!(permission.screen(Some(&BASIC), Crud::Read), Decision::NeedsRecord);
        assert_eq!(
            permission.authorize(Some(&BASIC), &Doc { owner: 99 }, Crud::Read),
            Decision::Deny("not your document".into())
        );
        assert_eq!(
            permission.authorize(Some(&BASIC), &Doc { owner: 1 }, Crud::Read),
            Decision::Allow
        );
    }

    #[test]
    fn test_no_matching_rule_denies() {
        let permission: Permission<Doc> = Permission::unconditional(&[Role::SuperUser]);
        assert_eq!(
            permission.authorize(Some(&ADMIN), &Doc { owner: 2 }, Crud::Modification),
            Decision::Deny("modification requires an elevated permission level".into())
        );
    }

    #[test]
    fn test_missing_actor_is_never_allowed() {
        let permission = Permission::unconditional(&Role::ALL).conditional(owner_only);
        assert_eq!(
            permission.authorize(None, &Doc { owner: 1 }, Crud::Read),
            Decision::Unauthenticated
        );
        assert!(!authorize_many(None, Some(&Role::ALL)));
        assert_eq!(
            authorize_roles(None, &Role::ALL, Crud::Creation),
            Decision::Unauthenticated
        );
    }

    #[test]
    fn test_listing_without_pragma_is_unrestricted() {
        assert!(authorize_many(None, None));
        assert!(authorize_many(Some(&BASIC), None));
        assert!(authorize_many(Some(&ADMIN), Some(&[Role::AdminUser])));
        assert!(!authorize_many(Some(&BASIC), Some(&[Role::AdminUser])));
    }
}
