pub mod codec;
pub mod error;
pub mod frame;
pub mod item;
pub mod session;
pub mod value;

pub use error::{Error as S7Error, ErrorCode, Result as S7Result};
