use diesel_derive_newtype::DieselNewType;
use teloxide::types::UserId;

/// A newtype wrapper for a Telegram user id stored in the database.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, DieselNewType,
)]
pub struct DbUserId(i64);

impl From<UserId> for DbUserId {
    fn from(id: UserId) -> Self {
        Self(id.0.try_into().expect("UserId is too big"))
    }
}

impl From<DbUserId> for UserId {
    fn from(id: DbUserId) -> Self {
        Self(id.0.try_into().expect("DbUserId is too big"))
    }
}
