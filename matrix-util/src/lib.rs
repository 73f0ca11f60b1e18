pub mod common_io;
pub mod ndarray_io;
pub mod ndarray_stat;
pub mod traits;
pub mod utils;
