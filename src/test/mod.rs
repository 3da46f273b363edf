pub mod utils;

mod attendance;
mod schedule;
mod subjects;
