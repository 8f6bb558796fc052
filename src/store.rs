//! All database queries the dialogue needs. Events and channels are written
//! by the external admin tooling; this bot only reads them. Users and
//! attendance records are owned by the bot.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::db::DbUserId;
use crate::models::{
    Attendance, AttendanceStatus, Category, Event, EventType, TelegramChannel,
    User,
};
use crate::schema;

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Look up a user by Telegram id, creating a row on first contact.
/// The boolean is `true` when the row was created by this call.
pub fn get_or_create_user(
    conn: &mut SqliteConnection,
    tg_id: DbUserId,
    username: Option<&str>,
) -> QueryResult<(User, bool)> {
    if let Some(user) = schema::users::table
        .find(tg_id)
        .first::<User>(conn)
        .optional()?
    {
        return Ok((user, false));
    }
    let user = User {
        tg_id,
        username: username.map(ToOwned::to_owned),
        is_admin: false,
        created_at: now(),
    };
    diesel::insert_into(schema::users::table).values(&user).execute(conn)?;
    Ok((user, true))
}

pub fn user_by_id(
    conn: &mut SqliteConnection,
    tg_id: DbUserId,
) -> QueryResult<Option<User>> {
    schema::users::table.find(tg_id).first(conn).optional()
}

/// Future events of the given type and category, soonest first.
pub fn upcoming_events(
    conn: &mut SqliteConnection,
    event_type: EventType,
    category: Category,
) -> QueryResult<Vec<Event>> {
    schema::events::table
        .filter(schema::events::event_type.eq(event_type))
        .filter(schema::events::category.eq(category))
        .filter(schema::events::date_time.ge(now()))
        .order(schema::events::date_time.asc())
        .load(conn)
}

/// Future events the user has an attendance record for, soonest first.
pub fn upcoming_user_events(
    conn: &mut SqliteConnection,
    user_id: DbUserId,
    status: AttendanceStatus,
) -> QueryResult<Vec<Event>> {
    schema::events::table
        .inner_join(schema::attendances::table)
        .filter(schema::attendances::user_id.eq(user_id))
        .filter(schema::attendances::status.eq(status))
        .filter(schema::events::date_time.ge(now()))
        .order(schema::events::date_time.asc())
        .select(schema::events::all_columns)
        .load(conn)
}

/// Future events of a private channel, soonest first.
pub fn channel_upcoming_events(
    conn: &mut SqliteConnection,
    channel_id: i32,
) -> QueryResult<Vec<Event>> {
    schema::events::table
        .filter(schema::events::channel_id.eq(channel_id))
        .filter(schema::events::is_private.eq(true))
        .filter(schema::events::date_time.ge(now()))
        .order(schema::events::date_time.asc())
        .load(conn)
}

/// Ids of the events the user is going to, for filtering listings.
pub fn attending_event_ids(
    conn: &mut SqliteConnection,
    user_id: DbUserId,
) -> QueryResult<HashSet<i32>> {
    schema::attendances::table
        .filter(schema::attendances::user_id.eq(user_id))
        .filter(schema::attendances::status.eq(AttendanceStatus::Going))
        .select(schema::attendances::event_id)
        .load::<i32>(conn)
        .map(|ids| ids.into_iter().collect())
}

pub fn event_by_id(
    conn: &mut SqliteConnection,
    event_id: i32,
) -> QueryResult<Option<Event>> {
    schema::events::table.find(event_id).first(conn).optional()
}

pub fn find_attendance(
    conn: &mut SqliteConnection,
    user_id: DbUserId,
    event_id: i32,
) -> QueryResult<Option<Attendance>> {
    schema::attendances::table
        .find((user_id, event_id))
        .first(conn)
        .optional()
}

/// Create or update the attendance record for `(user, event)`. The composite
/// primary key guarantees at most one row per pair.
pub fn upsert_attendance(
    conn: &mut SqliteConnection,
    user_id: DbUserId,
    event_id: i32,
    status: AttendanceStatus,
) -> QueryResult<Attendance> {
    let attendance = Attendance { user_id, event_id, status, created_at: now() };
    diesel::insert_into(schema::attendances::table)
        .values(&attendance)
        .on_conflict((
            schema::attendances::user_id,
            schema::attendances::event_id,
        ))
        .do_update()
        .set(schema::attendances::status.eq(status))
        .execute(conn)?;
    schema::attendances::table.find((user_id, event_id)).first(conn)
}

/// Delete the attendance record for `(user, event)` if any, returning the
/// number of deleted rows. Deleting a missing record is not an error.
pub fn delete_attendance(
    conn: &mut SqliteConnection,
    user_id: DbUserId,
    event_id: i32,
) -> QueryResult<usize> {
    diesel::delete(schema::attendances::table.find((user_id, event_id)))
        .execute(conn)
}

pub fn list_channels(
    conn: &mut SqliteConnection,
) -> QueryResult<Vec<TelegramChannel>> {
    schema::telegram_channels::table
        .order(schema::telegram_channels::name.asc())
        .load(conn)
}

pub fn channel_by_id(
    conn: &mut SqliteConnection,
    channel_id: i32,
) -> QueryResult<Option<TelegramChannel>> {
    schema::telegram_channels::table
        .find(channel_id)
        .first(conn)
        .optional()
}
