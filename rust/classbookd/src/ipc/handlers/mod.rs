pub mod attendance;
pub mod classes;
pub mod core;
pub mod export;
pub mod lessons;
pub mod students;
pub mod subjects;
