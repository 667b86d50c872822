//! Per-entity repository modules. All functions take an explicit `&PgPool`.

pub mod bridged_rooms;
pub mod bridged_users;
pub mod messages;
pub mod rooms;
pub mod settings;
pub mod subscriptions;
pub mod uploads;
pub mod users;
