use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::db::DbUserId;

/// An error returned when parsing an enum from its text form fails.
#[derive(Debug)]
pub struct UnknownVariant(pub String);

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown variant {:?}", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

/// Define an enum stored as text in the database and used verbatim in
/// callback payloads. Each variant carries a display label for keyboards.
macro_rules! text_enum {
    (
        $( #[ $attr:meta ] )*
        $name:ident {
            $( $variant:ident: $text:literal, $label:literal; )+
        }
    ) => {
        $( #[ $attr ] )*
        #[derive(
            Copy,
            Clone,
            Debug,
            Eq,
            PartialEq,
            Hash,
            diesel::AsExpression,
            diesel::FromSqlRow,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $( $variant, )+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$( Self::$variant, )+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text, )+
                }
            }

            pub const fn label(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;
            fn from_str(s: &str) -> Result<Self, UnknownVariant> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    _ => Err(UnknownVariant(s.to_string())),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(
                &self,
                f: &mut std::fmt::Formatter<'_>,
            ) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl
            diesel::serialize::ToSql<
                diesel::sql_types::Text,
                diesel::sqlite::Sqlite,
            > for $name
        {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<
                    'b,
                    '_,
                    diesel::sqlite::Sqlite,
                >,
            ) -> diesel::serialize::Result {
                out.set_value(self.as_str());
                Ok(diesel::serialize::IsNull::No)
            }
        }

        impl
            diesel::deserialize::FromSql<
                diesel::sql_types::Text,
                diesel::sqlite::Sqlite,
            > for $name
        {
            fn from_sql(
                bytes: <diesel::sqlite::Sqlite as diesel::backend::Backend>
                    ::RawValue<'_>,
            ) -> diesel::deserialize::Result<Self> {
                let s = <String as diesel::deserialize::FromSql<
                    diesel::sql_types::Text,
                    diesel::sqlite::Sqlite,
                >>::from_sql(bytes)?;
                s.parse().map_err(Into::into)
            }
        }
    };
}

text_enum! {
    /// How an event is attended.
    EventType {
        Online: "online", "🌐 Online";
        Offline: "offline", "🏙 Offline";
        Hybrid: "hybrid", "🔀 Hybrid";
    }
}

text_enum! {
    /// What kind of event it is.
    Category {
        Concert: "concert", "🎶 Concerts";
        Meeting: "meeting", "💬 Meetups";
        Marathon: "marathon", "🏃 Marathons";
        Training: "training", "📚 Trainings";
    }
}

text_enum! {
    /// RSVP status of an attendance record.
    AttendanceStatus {
        Going: "going", "✅ Going";
    }
}

// Database models

#[derive(Clone, Debug, Insertable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub tg_id: DbUserId,
    pub username: Option<String>,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::telegram_channels)]
pub struct TelegramChannel {
    pub id: i32,
    pub channel_id: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::events)]
pub struct Event {
    pub id: i32,
    pub name: String,
    pub location: String,
    pub address: String,
    pub event_type: EventType,
    pub category: Category,
    pub date_time: NaiveDateTime,
    pub details: Option<String>,
    pub map_link: Option<String>,
    pub is_private: bool,
    pub channel_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Insertable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::attendances)]
pub struct Attendance {
    pub user_id: DbUserId,
    pub event_id: i32,
    pub status: AttendanceStatus,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_enum_round_trip() {
        for ty in EventType::ALL {
            assert_eq!(ty.as_str().parse::<EventType>().unwrap(), *ty);
        }
        for cat in Category::ALL {
            assert_eq!(cat.as_str().parse::<Category>().unwrap(), *cat);
        }
        assert_eq!(
            "going".parse::<AttendanceStatus>().unwrap(),
            AttendanceStatus::Going
        );
        assert!("gone".parse::<AttendanceStatus>().is_err());
    }
}
