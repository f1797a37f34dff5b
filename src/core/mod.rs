pub mod athlete;
pub mod car;
pub mod carpool;
pub mod db;
pub mod fixture;
pub mod settings;
pub mod team;
