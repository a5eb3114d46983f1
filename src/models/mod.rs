pub mod category;
pub mod event;
pub mod file;
pub mod ticket;
pub mod token;
pub mod user;

pub use category::{Category, EventCategory, NewCategory};
pub use event::{Event, EventChanges, EventStatus, NewEvent};
pub use file::{File, NewFile};
pub use ticket::{NewTicket, Ticket, TicketChanges};
pub use token::{NewToken, Token};
pub use user::{NewUser, User, UserChanges, UserRole};
