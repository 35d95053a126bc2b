pub mod pagination;
pub mod response;
pub mod validation;

pub use pagination::{PageParams, Pagination};
pub use response::{ApiError, ApiResponse};
pub use validation::*;
