use super::validation;
use super::{Store, lenient_text};
use crate::core::{Actor, Fields, InvalidInput, Role, Value};
use crate::engine::{
    AccessPragma, Authorization, ComputedField, Permission, Placeholder, TableDescriptor,
    Validator,
};
use crate::storage::{MemoryTable, Model};
use futures::FutureExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(deserialize_with = "lenient_text")]
    pub first_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub last_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub profile_picture_uri: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl Model for User {
    fn id(&self) -> i64 {
        self.id
    }
}

pub fn store() -> Store<User> {
    MemoryTable::new("User")
        .unique(&["username"])
        .unique(&["email"])
}

pub fn descriptor(bcrypt_cost: u32) -> TableDescriptor<User> {
    TableDescriptor::new("User")
        .schema(&["first_name", "last_name", "username", "email", "password", "role"])
        .unique(&["username", "email"])
        .computed(hashed_password(bcrypt_cost))
        .computed(profile_picture())
        .hidden("password", Placeholder::SameLength('*'))
        .immutable(Role::BasicUser, &["role"])
        .immutable(Role::AdminUser, &["role"])
        .immutable(Role::SuperUser, &[])
        .validators(name_rules("first_name"))
        .validators(name_rules("last_name"))
        .validator(Validator::sync("username must only contain alphanumeric characters", |f| {
            validation::alphanumeric(f, "username")
        }))
        .validator(Validator::sync("username must be between 5 and 10 characters", |f| {
            validation::length_between(f, "username", 5, 10)
        }))
        .validator(Validator::sync("email must be a valid email address", |f| {
            validation::email(f, "email")
        }))
        .validator(Validator::sync(
            "email must contain the username",
            validation::email_contains_username,
        ))
        .validator(Validator::sync("password must be between 8 and 16 characters", |f| {
            validation::length_between(f, "password", 8, 16)
        }))
        .validator(Validator::sync("password must contain a number", |f| {
            validation::contains_digit(f, "password")
        }))
        .validator(Validator::sync("password must contain a special character", |f| {
            validation::contains_special(f, "password")
        }))
        .access(AccessPragma {
            create: Some(vec![Role::SuperUser]),
            read: Some(
                Permission::unconditional(&[Role::AdminUser, Role::SuperUser]).conditional(read_own),
            ),
            read_many: Some(vec![Role::AdminUser, Role::SuperUser]),
            update: Some(
                Permission::unconditional(&[Role::AdminUser, Role::SuperUser]).conditional(modify_own),
            ),
            delete: Some(
                Permission::default()
                    .deny_roles(&[Role::BasicUser])
                    .conditional(delete_lower),
            ),
        })
        .seed("users", &[Role::SuperUser])
}

fn name_rules(field: &'static str) -> Vec<Validator> {
    vec![
        Validator::sync(format!("{field} must not be empty"), move |f| {
            validation::present(f, field)
        }),
        Validator::sync(
            format!("{field} must only contain alphanumeric characters"),
            move |f| validation::alphanumeric(f, field),
        ),
        Validator::sync(format!("{field} must be between 2 and 50 characters"), move |f| {
            validation::length_between(f, field, 2, 50)
        }),
    ]
}

fn read_own(user: &User, actor: &Actor) -> Authorization {
    if user.id == actor.id {
        Authorization::allow()
    } else {
        Authorization::deny(format!(
            "{} can only read their own data! Try GET api/v1/users/{}/",
            actor.role.with_article(),
            actor.id
        ))
    }
}

fn modify_own(user: &User, actor: &Actor) -> Authorization {
    if user.id == actor.id {
        Authorization::allow()
    } else {
        Authorization::deny(format!(
            "{} can only modify their own data! Try PUT api/v1/users/{}/",
            actor.role.with_article(),
            actor.id
        ))
    }
}

fn delete_lower(user: &User, actor: &Actor) -> Authorization {
    match (actor.role, user.role) {
        (_, Role::SuperUser) => Authorization::deny(
            "Although you are powerful, you are not *all* powerful! SUPER_USERs may not be deleted",
        ),
        (Role::AdminUser, Role::AdminUser) => {
            Authorization::deny("ADMIN_USERs may only delete BASIC_USERs")
        }
        _ => Authorization::allow(),
    }
}

fn hashed_password(cost: u32) -> ComputedField {
    ComputedField::new("password", move |fields| {
        let raw = validation::text(fields, "password");
        hash_password(raw, cost).boxed()
    })
}

async fn hash_password(raw: Option<String>, cost: u32) -> anyhow::Result<Value> {
    let raw = raw.ok_or_else(|| InvalidInput("password must not be empty".into()))?;
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(raw, cost)).await??;
    Ok(Value::Text(hashed))
}

fn profile_picture() -> ComputedField {
    ComputedField::new("profile_picture_uri", |fields: &Fields| {
        let seed = format!(
            "{}{}",
            validation::text(fields, "email").unwrap_or_default(),
            validation::text(fields, "username").unwrap_or_default()
        );
        let uri = avatar_uri(hash_string(&seed));
        async move { Ok::<_, anyhow::Error>(Value::Text(uri)) }.boxed()
    })
}

/// 32-bit rolling string hash (`h * 31 + c` over UTF-16 units); the shift
/// wraps to 32 bits while the running sum does not.
pub fn hash_string(text: &str) -> i64 {
    text.encode_utf16().fold(0i64, |hash, unit| {
        let shifted = (hash as i32).wrapping_shl(5);
        i64::from(shifted) - hash + i64::from(unit)
    })
}

pub fn avatar_uri(hash: i64) -> String {
    format!("https://avatars.dicebear.com/api/human/{hash}.svg")
}
