//! Request and response bodies.

pub mod category;
pub mod event;
pub mod file;
pub mod ticket;
pub mod user;

pub use category::CategoryCreateRequest;
pub use event::{CategoryRef, EventCreateRequest, EventListQuery, EventRead, EventUpdateRequest};
pub use file::{FileRead, FileRef};
pub use ticket::{TicketCreateRequest, TicketInput};
pub use user::{
    LoginRequest, LoginResponse, ProfileUpdateRequest, RegisterRequest, UserRead,
    VerifyCodeRequest,
};
