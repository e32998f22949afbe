pub mod board;
pub mod commit;
pub mod indices;
pub mod io;
