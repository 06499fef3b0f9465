use std::{fmt, str::FromStr};

use chrono::{Local, NaiveDateTime, Timelike};
use diesel::{
    deserialize::FromSql,
    prelude::*,
    serialize::{IsNull, ToSql},
    sql_types::Text,
    sqlite::{Sqlite, SqliteValue},
    AsExpression, FromSqlRow,
};

/// Storage format of `games.last_changed`, shared with databases written by
/// earlier versions of this tool.
pub const CHANGED_AT_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Queryable, Identifiable, Selectable, Insertable, Debug, PartialEq, Eq, Clone)]
#[diesel(table_name = super::schema::games, primary_key(streamer))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BroadcasterRecord {
    pub streamer: String,
    /// `None` when the broadcaster streams without a category
    pub game: Option<String>,
    /// `None` for rows written without a timestamp by earlier versions
    pub last_changed: Option<ChangedAt>,
}

/// Local wall-clock time of a game change, truncated to the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromSqlRow, AsExpression)]
#[diesel(sql_type = Text)]
pub struct ChangedAt(NaiveDateTime);

impl ChangedAt {
    pub fn now() -> ChangedAt {
        ChangedAt::from_naive(Local::now().naive_local())
    }

    pub fn from_naive(value: NaiveDateTime) -> ChangedAt {
        ChangedAt(
            value
                .with_second(0)
                .and_then(|x| x.with_nanosecond(0))
                .unwrap_or(value),
        )
    }
}

impl fmt::Display for ChangedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CHANGED_AT_FORMAT))
    }
}

impl FromStr for ChangedAt {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s, CHANGED_AT_FORMAT).map(ChangedAt)
    }
}

impl FromSql<Text, Sqlite> for ChangedAt {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> diesel::deserialize::Result<Self> {
        let s: String = FromSql::<Text, Sqlite>::from_sql(bytes)?;
        Ok(s.parse::<ChangedAt>()?)
    }
}

impl ToSql<Text, Sqlite> for ChangedAt {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        out.set_value(self.to_string());
        Ok(IsNull::No)
    }
}
